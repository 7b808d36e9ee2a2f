//! Host-side register file.
//!
//! [`SimRegisters`] stores plain words and emulates the handful of hardware
//! reactions the drivers wait for:
//!
//! - oscillator and PLL ready flags follow their enable bits after a configurable
//!   number of reads (or never, to provoke timeouts)
//! - `CFGR.SWS` mirrors `CFGR.SW` once the requested source is ready
//! - SysTick `COUNTFLAG` sets after a number of `CTRL` reads and clears on read
//! - U(S)ART status reports an empty transmitter, received bytes are queued and
//!   transmitted bytes captured
//!
//! Every write is logged so tests can assert on ordering.

extern crate std;

use core::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::vec::Vec;

use super::{usart, Field, Reg, RegisterFile, RCC, SYSTICK};
use crate::UsartInstance;

const PLLCFGR_RESET: u32 = 0x2400_3010;

struct Follower {
    enable: Field,
    ready: Field,
    on_latency: Option<u32>,
    off_latency: Option<u32>,
    countdown: u32,
}

struct UsartSim {
    regs: usart::Regs,
    rx: VecDeque<u8>,
    tx: Vec<u8>,
}

#[derive(Default)]
struct State {
    values: BTreeMap<Reg, u32>,
    log: Vec<(Reg, u32)>,
    reads: BTreeMap<Reg, usize>,
    followers: Vec<Follower>,
    switch_stalled: bool,
    tick_reads: u32,
    tick_countdown: u32,
    usarts: Vec<UsartSim>,
}

impl State {
    fn raw(&self, reg: Reg) -> u32 {
        self.values.get(&reg).copied().unwrap_or(0)
    }

    fn raw_field(&self, field: Field) -> u32 {
        field.extract(self.raw(field.reg()))
    }

    fn store_field(&mut self, field: Field, value: u32) {
        let raw = field.insert(self.raw(field.reg()), value);
        self.values.insert(field.reg(), raw);
    }

    fn settle_followers(&mut self, reg: Reg) {
        for i in 0..self.followers.len() {
            let (enable, ready) = (self.followers[i].enable, self.followers[i].ready);
            if ready.reg() != reg {
                continue;
            }
            let target = self.raw_field(enable);
            if self.raw_field(ready) == target {
                continue;
            }
            let f = &self.followers[i];
            let latency = if target != 0 { f.on_latency } else { f.off_latency };
            if latency.is_none() {
                continue;
            }
            if f.countdown == 0 {
                self.store_field(ready, target);
            } else {
                self.followers[i].countdown -= 1;
            }
        }
    }

    fn settle_switch(&mut self) {
        if self.switch_stalled {
            return;
        }
        let sw = self.raw_field(RCC.cfgr().sw());
        let ready = match sw {
            0b00 => RCC.cr().hsirdy(),
            0b01 => RCC.cr().hserdy(),
            0b10 => RCC.cr().pllrdy(),
            _ => return,
        };
        if self.raw_field(ready) != 0 {
            self.store_field(RCC.cfgr().sws(), sw);
        }
    }

    fn read(&mut self, reg: Reg) -> u32 {
        *self.reads.entry(reg).or_insert(0) += 1;

        self.settle_followers(reg);
        if reg == RCC.cfgr().reg() {
            self.settle_switch();
        }

        if reg == SYSTICK.ctrl().reg() {
            return self.read_systick_ctrl();
        }

        if let Some(i) = self.usarts.iter().position(|u| u.regs.sr().reg() == reg) {
            let flags = self.usarts[i].regs.sr();
            let mut sr = self.raw(reg) | flags.txe().mask() | flags.tc().mask();
            if !self.usarts[i].rx.is_empty() {
                sr |= flags.rxne().mask();
            }
            return sr;
        }

        if let Some(i) = self.usarts.iter().position(|u| u.regs.dr().reg() == reg) {
            // SR-then-DR read sequence clears the error flags
            let flags = self.usarts[i].regs.sr();
            let errors = flags.pe().mask() | flags.fe().mask() | flags.nf().mask() | flags.ore().mask();
            let cleared = self.raw(flags.reg()) & !errors;
            self.values.insert(flags.reg(), cleared);
            return self.usarts[i].rx.pop_front().map(u32::from).unwrap_or(0);
        }

        self.raw(reg)
    }

    fn read_systick_ctrl(&mut self) -> u32 {
        let fields = SYSTICK.ctrl();
        let ctrl = self.raw(fields.reg()) & !fields.countflag().mask();
        if fields.enable().extract(ctrl) == 0 {
            return ctrl;
        }
        if self.tick_countdown == 0 {
            self.tick_countdown = self.tick_reads;
            ctrl | fields.countflag().mask()
        } else {
            self.tick_countdown -= 1;
            ctrl
        }
    }

    fn write(&mut self, reg: Reg, value: u32) {
        self.log.push((reg, value));

        let old = self.raw(reg);
        for f in self.followers.iter_mut() {
            if f.enable.reg() == reg && f.enable.extract(old) != f.enable.extract(value) {
                let latency = if f.enable.extract(value) != 0 { f.on_latency } else { f.off_latency };
                f.countdown = latency.unwrap_or(0);
            }
        }

        if reg == SYSTICK.val().reg() {
            self.tick_countdown = self.tick_reads;
            // the counter register always reads back as zero after a write
            self.values.insert(reg, 0);
            return;
        }

        if let Some(u) = self.usarts.iter_mut().find(|u| u.regs.dr().reg() == reg) {
            u.tx.push(value as u8);
            return;
        }

        // ready and status bits are owned by the hardware
        let (cr, cfgr) = (RCC.cr(), RCC.cfgr());
        let value = if reg == cr.reg() {
            let hw = cr.hsirdy().mask() | cr.hserdy().mask() | cr.pllrdy().mask();
            (value & !hw) | (old & hw)
        } else if reg == cfgr.reg() {
            cfgr.sws().insert(value, cfgr.sws().extract(old))
        } else {
            value
        };
        self.values.insert(reg, value);
    }
}

/// Simulated register file, see the module documentation.
pub struct SimRegisters {
    state: RefCell<State>,
}

impl SimRegisters {
    /// Registers at their reset values: HSI on and ready, sysclk on HSI,
    /// PLLCFGR at `0x2400_3010`, everything else zero.
    pub fn new() -> Self {
        let mut state = State::default();
        state.values.insert(RCC.cr().reg(), 0x0000_0083);
        state.values.insert(RCC.pllcfgr().reg(), PLLCFGR_RESET);
        state.followers = Vec::from([
            Follower { enable: RCC.cr().hsion(), ready: RCC.cr().hsirdy(), on_latency: Some(2), off_latency: Some(0), countdown: 0 },
            Follower { enable: RCC.cr().hseon(), ready: RCC.cr().hserdy(), on_latency: Some(4), off_latency: Some(0), countdown: 0 },
            Follower { enable: RCC.cr().pllon(), ready: RCC.cr().pllrdy(), on_latency: Some(3), off_latency: Some(1), countdown: 0 },
        ]);
        state.usarts = UsartInstance::ALL
            .iter()
            .map(|u| UsartSim { regs: usart::Regs::new(u.address()), rx: VecDeque::new(), tx: Vec::new() })
            .collect();
        state.tick_reads = 1;
        Self { state: RefCell::new(state) }
    }

    /// Number of polls before `ready` follows its enable bit when switched on and
    /// off. `None` leaves the flag stuck in that direction.
    pub fn set_ready_latency(&self, ready: Field, on: Option<u32>, off: Option<u32>) {
        let mut state = self.state.borrow_mut();
        if let Some(f) = state.followers.iter_mut().find(|f| f.ready == ready) {
            f.on_latency = on;
            f.off_latency = off;
        }
    }

    /// Keep `CFGR.SWS` frozen regardless of `CFGR.SW`.
    pub fn stall_clock_switch(&self, stalled: bool) {
        self.state.borrow_mut().switch_stalled = stalled;
    }

    /// Number of `CTRL` reads between two SysTick wrap-arounds.
    pub fn set_systick_period(&self, reads: u32) {
        let mut state = self.state.borrow_mut();
        state.tick_reads = reads;
        state.tick_countdown = reads;
    }

    /// Overwrites a register without logging or side effects.
    pub fn force(&self, reg: Reg, value: u32) {
        self.state.borrow_mut().values.insert(reg, value);
    }

    /// Current value without read side effects.
    pub fn peek(&self, reg: Reg) -> u32 {
        self.state.borrow().raw(reg)
    }

    pub fn peek_field(&self, field: Field) -> u32 {
        self.state.borrow().raw_field(field)
    }

    /// Every write so far, in order.
    pub fn writes(&self) -> Vec<(Reg, u32)> {
        self.state.borrow().log.clone()
    }

    /// Values written to `reg`, in order.
    pub fn writes_to(&self, reg: Reg) -> Vec<u32> {
        self.state.borrow().log.iter().filter(|(r, _)| *r == reg).map(|(_, v)| *v).collect()
    }

    pub fn reads_of(&self, reg: Reg) -> usize {
        self.state.borrow().reads.get(&reg).copied().unwrap_or(0)
    }

    pub fn clear_log(&self) {
        let mut state = self.state.borrow_mut();
        state.log.clear();
        state.reads.clear();
    }

    /// Queues bytes on the receiver of the instance at `base`.
    pub fn feed_rx(&self, base: u32, data: &[u8]) {
        let mut state = self.state.borrow_mut();
        if let Some(u) = state.usarts.iter_mut().find(|u| u.regs == usart::Regs::new(base)) {
            u.rx.extend(data.iter().copied());
        }
    }

    /// Drains the bytes transmitted by the instance at `base`.
    pub fn take_tx(&self, base: u32) -> Vec<u8> {
        let mut state = self.state.borrow_mut();
        state
            .usarts
            .iter_mut()
            .find(|u| u.regs == usart::Regs::new(base))
            .map(|u| core::mem::take(&mut u.tx))
            .unwrap_or_default()
    }
}

impl Default for SimRegisters {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterFile for SimRegisters {
    fn read(&self, reg: Reg) -> u32 {
        self.state.borrow_mut().read(reg)
    }

    fn write(&self, reg: Reg, value: u32) {
        self.state.borrow_mut().write(reg, value)
    }
}
