/// Upper bound for a busy-wait on a hardware flag.
///
/// `Unbounded` waits forever, which is how the clock tree has always been brought
/// up on this family. `Iterations(n)` gives up after `n` polls of the flag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PollLimit {
    #[default]
    Unbounded,
    Iterations(u32),
}

/// A bounded wait ran out of iterations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timeout;

/// Spin-loop body between two polls of a hardware flag.
#[inline(always)]
pub(crate) fn relax() {
    #[cfg(all(target_arch = "arm", target_os = "none"))]
    cortex_m::asm::nop();
}

/// Blocks until a condition becomes false or the poll limit is reached.
#[inline]
pub fn blocking_wait<F>(mut condition: F, limit: PollLimit) -> Result<(), Timeout>
where
    F: FnMut() -> bool,
{
    match limit {
        PollLimit::Unbounded => {
            while condition() {
                relax();
            }
            Ok(())
        }
        PollLimit::Iterations(n) => {
            for _ in 0..n {
                if !condition() {
                    return Ok(());
                }
                relax();
            }
            Err(Timeout)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_wait_gives_up() {
        let mut polls = 0;
        let res = blocking_wait(|| { polls += 1; true }, PollLimit::Iterations(4));
        assert_eq!(res, Err(Timeout));
        assert_eq!(polls, 4);
    }

    #[test]
    fn wait_returns_once_condition_clears() {
        let mut polls = 0;
        let res = blocking_wait(|| { polls += 1; polls < 3 }, PollLimit::Iterations(10));
        assert_eq!(res, Ok(()));
        assert_eq!(polls, 3);

        let mut polls = 0;
        let res = blocking_wait(|| { polls += 1; polls < 100 }, PollLimit::Unbounded);
        assert_eq!(res, Ok(()));
        assert_eq!(polls, 100);
    }
}
