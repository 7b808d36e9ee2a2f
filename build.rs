use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;

use proc_macro2::{Literal, TokenStream};
use quote::format_ident;
use quote::quote;
use regex::Regex;

mod build_serde;
// Structures imported from build_serde.rs
use build_serde::{Array, Block, FieldSet, Field, PeripheralKind, Peripherals, IR};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Retrieve all enabled features
    let chip_name = match env::vars()
        .map(|(a, _)| a)
        .filter(|x| x.starts_with("CARGO_FEATURE_STM32"))
        .get_one()
    {
        Ok(x) => x,
        Err(GetOneError::None) => panic!("No stm32xx Cargo feature enabled"),
        Err(GetOneError::Multiple) => panic!("Multiple stm32xx Cargo features enabled"),
    }
        .strip_prefix("CARGO_FEATURE_")
        .unwrap()
        .to_ascii_lowercase();

    println!("cargo:rerun-if-changed=data/{}", chip_name);
    println!("cargo:rerun-if-changed=build_serde.rs");
    let data_dir = Path::new("data").join(&chip_name);

    // Read and parse every register block description (chiptool IR, one block per file)
    let mut block_paths: Vec<PathBuf> = fs::read_dir(&data_dir)
        .map_err(|e| format!("Failed to read {}: {}", data_dir.display(), e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "yaml"))
        .filter(|path| path.file_name().is_some_and(|name| name != "peripherals.yaml"))
        .collect();
    block_paths.sort();

    let mut irs = Vec::new();
    for path in &block_paths {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        let ir: IR = serde_yaml::from_str(&content)
            .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))?;
        irs.push(ir);
    }

    let rcc_ir = irs.iter()
        .find(|ir| ir.blocks.contains_key("RCC"))
        .ok_or("RCC block not found")?;
    let rcc_block = &rcc_ir.blocks["RCC"];

    // Read and parse peripherals.yaml
    let peripherals_path = data_dir.join("peripherals.yaml");
    let peripherals_content = fs::read_to_string(&peripherals_path)
        .map_err(|e| format!("Failed to read peripherals.yaml: {}", e))?;
    let peripherals: Peripherals = serde_yaml::from_str(&peripherals_content)
        .map_err(|e| format!("Failed to parse peripherals.yaml: {}", e))?;

    // Get output path from env
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    // Register layouts, included by `pac`
    let mut pac_tokens = TokenStream::new();
    for ir in &irs {
        for (name, block) in &ir.blocks {
            pac_tokens.extend(generate_block(name, block, &ir.fieldsets));
        }
    }
    pac_tokens.extend(generate_system_instances(&peripherals, &irs));
    write_tokens(&out_dir.join("pac.rs"), pac_tokens);

    // HAL enums, included by `_generated`
    let mut token_stream = TokenStream::new();

    token_stream.extend(quote! {
        use crate::pac::Field;
        use crate::rcc::BusClock;
    });

    token_stream.extend(generate_peripheral_enum(&peripherals, rcc_block, &rcc_ir.fieldsets));
    token_stream.extend(generate_port_enum(&peripherals));
    token_stream.extend(generate_usart_enum(&peripherals));

    write_tokens(&out_dir.join("_generated.rs"), token_stream);

    Ok(())
}

fn write_tokens(dest_path: &Path, tokens: TokenStream) {
    let mut file = File::create(dest_path).unwrap();
    write!(file, "{}", tokens).unwrap();
    rustfmt(dest_path);
}

/// Register block module: a `Regs` handle over a base address, one accessor per
/// register and one type per fieldset with an accessor per field.
fn generate_block(name: &str, block: &Block, fieldsets: &BTreeMap<String, FieldSet>) -> TokenStream {
    let module = format_ident!("{}", name.to_ascii_lowercase());
    let block_doc = block.description.clone().unwrap_or_else(|| name.to_string());

    let mut accessors = Vec::new();
    let mut used_fieldsets = BTreeSet::new();

    for item in &block.items {
        let method = format_ident!("{}", item.name.to_ascii_lowercase());
        let doc = item.description.clone().unwrap_or_else(|| item.name.clone());
        let fieldset = item.inner.fieldset.clone().unwrap_or_else(|| item.name.clone());
        assert!(fieldsets.contains_key(&fieldset), "{} fieldset not found", fieldset);
        let ty = format_ident!("{}", type_name(&fieldset));
        let offset = Literal::u32_unsuffixed(item.byte_offset);
        used_fieldsets.insert(fieldset);

        accessors.push(match item.array {
            None => quote! {
                #[doc = #doc]
                pub const fn #method(self) -> regs::#ty {
                    regs::#ty(Reg::at(self.base, #offset))
                }
            },
            Some(Array { len, stride }) => {
                let len = Literal::u32_unsuffixed(len);
                let stride = Literal::u32_unsuffixed(stride);
                quote! {
                    #[doc = #doc]
                    pub const fn #method(self, n: usize) -> regs::#ty {
                        ::core::assert!(n < #len);
                        regs::#ty(Reg::at(self.base, #offset + n as u32 * #stride))
                    }
                }
            }
        });
    }

    let types = used_fieldsets.iter().map(|fieldset_name| {
        let fieldset = &fieldsets[fieldset_name];
        let ty = format_ident!("{}", type_name(fieldset_name));
        let doc = fieldset.description.clone().unwrap_or_else(|| fieldset_name.clone());
        let fields = fieldset.fields.iter().map(|field| {
            let method = format_ident!("{}", field.name.to_ascii_lowercase());
            let doc = field.description.clone().unwrap_or_else(|| field.name.clone());
            let offset = Literal::u8_unsuffixed(field.bit_offset);
            let width = Literal::u32_unsuffixed(field.bit_size);
            match field.array {
                None => quote! {
                    #[doc = #doc]
                    pub const fn #method(self) -> Field {
                        Field::new(self.0, #offset, #width)
                    }
                },
                Some(Array { len, stride }) => {
                    let len = Literal::u32_unsuffixed(len);
                    let stride = Literal::u32_unsuffixed(stride);
                    quote! {
                        #[doc = #doc]
                        pub const fn #method(self, n: usize) -> Field {
                            ::core::assert!(n < #len);
                            Field::new(self.0, (#offset + n * #stride) as u8, #width)
                        }
                    }
                }
            }
        });
        quote! {
            #[doc = #doc]
            #[derive(Clone, Copy, Debug, PartialEq, Eq)]
            pub struct #ty(pub(crate) Reg);

            impl #ty {
                pub const fn reg(self) -> Reg {
                    self.0
                }

                #(#fields)*
            }
        }
    });

    quote! {
        #[doc = #block_doc]
        pub mod #module {
            use crate::pac::Reg;

            /// Register block at a base address.
            #[derive(Clone, Copy, Debug, PartialEq, Eq)]
            pub struct Regs {
                base: u32,
            }

            impl Regs {
                pub const fn new(base: u32) -> Self {
                    Self { base }
                }

                pub const fn base(self) -> u32 {
                    self.base
                }

                #(#accessors)*
            }

            pub mod regs {
                use crate::pac::{Field, Reg};

                #(#types)*
            }
        }
    }
}

/// Fixed instances of the always-on blocks, e.g. `pub const RCC: rcc::Regs`.
fn generate_system_instances(peripherals: &Peripherals, irs: &[IR]) -> TokenStream {
    let instances = peripherals.peripherals.iter()
        .filter(|p| p.kind == PeripheralKind::System)
        .map(|p| {
            let block = p.block.clone().unwrap_or_else(|| p.name.clone());
            assert!(
                irs.iter().any(|ir| ir.blocks.contains_key(&block)),
                "No register block {} for {}", block, p.name
            );
            let ident = format_ident!("{}", p.name);
            let module = format_ident!("{}", block.to_ascii_lowercase());
            let address = Literal::u32_unsuffixed(p.address());
            quote! {
                pub const #ident: #module::Regs = #module::Regs::new(#address);
            }
        });
    quote! { #(#instances)* }
}

/// "AHB1ENR" -> "Ahb1enr", "DIV_MANTISSA" -> "DivMantissa"
fn type_name(name: &str) -> String {
    to_pascal_case(&name.to_ascii_lowercase())
}

/// A located RCC gate: register and field names.
struct RccBit {
    register: String,
    field: String,
}

impl RccBit {
    fn path(&self) -> TokenStream {
        let register = format_ident!("{}", self.register.to_ascii_lowercase());
        let field = format_ident!("{}", self.field.to_ascii_lowercase());
        quote! { crate::pac::RCC.#register().#field() }
    }
}

fn generate_peripheral_enum(
    peripherals: &Peripherals,
    rcc_block: &Block,
    fieldsets: &BTreeMap<String, FieldSet>,
) -> TokenStream {
    let enr_regs = registers_with_suffix(rcc_block, fieldsets, "ENR");
    let rstr_regs = registers_with_suffix(rcc_block, fieldsets, "RSTR");

    let mut variants = Vec::new();
    let mut names = Vec::new();
    let mut addresses = Vec::new();
    let mut clocks = Vec::new();
    let mut enable_fields = Vec::new();
    let mut reset_fields = Vec::new();

    for peripheral in peripherals.peripherals.iter().filter(|p| p.kind != PeripheralKind::System) {
        let field_name = peripheral.rcc_field.clone().unwrap_or(peripheral.name.clone());
        let reset_name = peripheral.rcc_reset_field.clone().unwrap_or(field_name.clone());

        // Find matching fields in RCC registers
        let enr = find_field_in_registers(&enr_regs, &format!("^{}EN$", field_name))
            .unwrap_or_else(|| panic!("No ENR field found for peripheral {}", peripheral.name));
        let rstr = find_field_in_registers(&rstr_regs, &format!("^{}RST$", reset_name));

        let ident = format_ident!("{}", peripheral.name);
        let name = &peripheral.name;
        let address = peripheral.address();
        let clock = peripheral.clock.as_deref()
            .unwrap_or_else(|| panic!("Peripheral {} has no clock", peripheral.name));
        let clock = clock_to_path(clock);

        let enable = enr.path();
        let reset = match rstr {
            Some(bit) => {
                let path = bit.path();
                quote! { Some(#path) }
            }
            None => quote! { None },
        };

        variants.push(ident);
        names.push(name.clone());
        addresses.push(address);
        clocks.push(clock);
        enable_fields.push(enable);
        reset_fields.push(reset);
    }

    let count = variants.len();

    quote! {
        /// Peripherals with a clock gate in the RCC.
        #[allow(non_camel_case_types)]
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        pub enum Peripheral {
            #(#variants,)*
        }

        impl Peripheral {
            pub const ALL: [Peripheral; #count] = [#(Peripheral::#variants,)*];

            pub const fn name(self) -> &'static str {
                match self {
                    #(Peripheral::#variants => #names,)*
                }
            }

            /// Base address of the peripheral's register block.
            pub const fn address(self) -> u32 {
                match self {
                    #(Peripheral::#variants => #addresses,)*
                }
            }

            /// Clock domain the peripheral's kernel clock is taken from.
            pub const fn bus_clock(self) -> BusClock {
                match self {
                    #(Peripheral::#variants => #clocks,)*
                }
            }

            pub const fn enable_field(self) -> Field {
                match self {
                    #(Peripheral::#variants => #enable_fields,)*
                }
            }

            pub const fn reset_field(self) -> Option<Field> {
                match self {
                    #(Peripheral::#variants => #reset_fields,)*
                }
            }
        }
    }
}

fn generate_port_enum(peripherals: &Peripherals) -> TokenStream {
    let re = Regex::new(r"^GPIO([A-Z])$").unwrap();

    let ports: Vec<_> = peripherals.peripherals.iter()
        .filter(|p| p.kind == PeripheralKind::Gpio)
        .map(|p| {
            let letter = re.captures(&p.name)
                .unwrap_or_else(|| panic!("GPIO peripheral {} is not named GPIOx", p.name))[1]
                .to_string();
            (format_ident!("{}", letter), format_ident!("{}", p.name))
        })
        .collect();

    let letters: Vec<_> = ports.iter().map(|(l, _)| l).collect();
    let periphs: Vec<_> = ports.iter().map(|(_, p)| p).collect();
    let count = ports.len();

    quote! {
        /// GPIO ports.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        pub enum Port {
            #(#letters,)*
        }

        impl Port {
            pub const ALL: [Port; #count] = [#(Port::#letters,)*];

            pub const fn peripheral(self) -> Peripheral {
                match self {
                    #(Port::#letters => Peripheral::#periphs,)*
                }
            }

            pub const fn address(self) -> u32 {
                self.peripheral().address()
            }
        }
    }
}

fn generate_usart_enum(peripherals: &Peripherals) -> TokenStream {
    let usarts: Vec<_> = peripherals.peripherals.iter()
        .filter(|p| p.kind == PeripheralKind::Usart)
        .collect();

    let idents: Vec<_> = usarts.iter().map(|p| format_ident!("{}", p.name)).collect();
    let afs: Vec<_> = usarts.iter()
        .map(|p| p.af.unwrap_or_else(|| panic!("USART peripheral {} has no af", p.name)))
        .collect();
    let count = usarts.len();

    quote! {
        /// U(S)ART instances.
        #[allow(non_camel_case_types)]
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        pub enum UsartInstance {
            #(#idents,)*
        }

        impl UsartInstance {
            pub const ALL: [UsartInstance; #count] = [#(UsartInstance::#idents,)*];

            pub const fn peripheral(self) -> Peripheral {
                match self {
                    #(UsartInstance::#idents => Peripheral::#idents,)*
                }
            }

            pub const fn address(self) -> u32 {
                self.peripheral().address()
            }

            /// Alternate function number routing the instance to its pins.
            pub const fn af(self) -> u8 {
                match self {
                    #(UsartInstance::#idents => #afs,)*
                }
            }

            pub const fn bus_clock(self) -> BusClock {
                self.peripheral().bus_clock()
            }
        }
    }
}

fn clock_to_path(clock: &str) -> TokenStream {
    let path = format!("BusClock::{}", to_pascal_case(clock));
    let path: syn::Path = syn::parse_str(&path)
        .unwrap_or_else(|_| panic!("Invalid clock name {}", clock));
    quote! { #path }
}

fn registers_with_suffix<'a>(
    block: &'a Block,
    fieldsets: &'a BTreeMap<String, FieldSet>,
    suffix: &str,
) -> Vec<(&'a str, &'a FieldSet)> {
    block.items.iter()
        .filter(|item| item.name.ends_with(suffix))
        .map(|item| {
            let fieldset_name = item.inner.fieldset.as_ref().unwrap_or(&item.name);
            let fieldset = fieldsets.get(fieldset_name)
                .unwrap_or_else(|| panic!("{} fieldset not found", fieldset_name));
            (item.name.as_str(), fieldset)
        })
        .collect()
}

fn find_field_in_registers(
    registers: &[(&str, &FieldSet)],
    pattern: &str,
) -> Option<RccBit> {
    let re = Regex::new(pattern).unwrap();
    let found = registers.iter()
        .flat_map(|(register, fieldset)| fieldset.fields.iter().map(move |field| (*register, field)))
        .filter(|(_, field): &(&str, &Field)| re.is_match(&field.name))
        .map(|(register, field)| {
            assert_eq!(field.bit_size, 1, "RCC gate {} is not a single bit", field.name);
            RccBit { register: register.to_string(), field: field.name.clone() }
        });
    match found.get_one() {
        Ok(bit) => Some(bit),
        Err(GetOneError::None) => None,
        Err(GetOneError::Multiple) => panic!("Multiple RCC fields match {}", pattern),
    }
}

/// Converts a string like "foo_bar" or "foo" to "FooBar" or "Foo".
fn to_pascal_case(s: &str) -> String {
    s.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<String>()
}

enum GetOneError {
    None,
    Multiple,
}

trait IteratorExt: Iterator {
    fn get_one(self) -> Result<Self::Item, GetOneError>;
}

impl<T: Iterator> IteratorExt for T {
    fn get_one(mut self) -> Result<Self::Item, GetOneError> {
        match self.next() {
            None => Err(GetOneError::None),
            Some(res) => match self.next() {
                Some(_) => Err(GetOneError::Multiple),
                None => Ok(res),
            },
        }
    }
}

/// rustfmt a given path.
/// Failures are logged to stderr and ignored.
fn rustfmt(path: impl AsRef<Path>) {
    let path = path.as_ref();
    match Command::new("rustfmt").args([path]).output() {
        Err(e) => {
            eprintln!("failed to exec rustfmt {:?}: {:?}", path, e);
        }
        Ok(out) => {
            if !out.status.success() {
                eprintln!("rustfmt {:?} failed:", path);
                eprintln!("=== STDOUT:");
                std::io::stderr().write_all(&out.stdout).unwrap();
                eprintln!("=== STDERR:");
                std::io::stderr().write_all(&out.stderr).unwrap();
            }
        }
    }
}
