//! Kubernetes resource quantity parsing and formatting
//!
//! Quantities arrive as a digit run followed by an optional unit suffix
//! (`100m`, `200Mi`, `4`). They are normalized to a canonical integer
//! amount: CPU in milli-cores, memory in bytes.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

const KIB: u128 = 1 << 10;

/// Which resource a quantity measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Milli-cores
    Cpu,
    /// Bytes
    Memory,
}

impl ResourceKind {
    /// Scale applied when the suffix is absent or not in the table
    fn default_scale(self) -> Scale {
        match self {
            ResourceKind::Cpu => Scale::Multiply(1000),
            ResourceKind::Memory => Scale::Multiply(1),
        }
    }
}

/// A canonical, non-negative resource amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Quantity {
    amount: u128,
    kind: ResourceKind,
}

impl Quantity {
    pub fn new(amount: u128, kind: ResourceKind) -> Self {
        Self { amount, kind }
    }

    pub fn zero(kind: ResourceKind) -> Self {
        Self::new(0, kind)
    }

    pub fn cpu_millis(millis: u128) -> Self {
        Self::new(millis, ResourceKind::Cpu)
    }

    pub fn bytes(bytes: u128) -> Self {
        Self::new(bytes, ResourceKind::Memory)
    }

    /// Canonical amount (milli-cores or bytes)
    pub fn amount(&self) -> u128 {
        self.amount
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }
}

impl Add for Quantity {
    type Output = Quantity;

    fn add(self, rhs: Quantity) -> Quantity {
        debug_assert_eq!(self.kind, rhs.kind, "adding quantities of different kinds");
        Quantity::new(self.amount.saturating_add(rhs.amount), self.kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scale {
    Multiply(u128),
    /// Sub-milli CPU units; rounded up so that non-zero usage stays visible
    Divide(u128),
}

impl Scale {
    fn apply(self, digits: u128) -> u128 {
        match self {
            Scale::Multiply(factor) => digits.saturating_mul(factor),
            Scale::Divide(divisor) => digits.div_ceil(divisor),
        }
    }
}

fn suffix_scale(suffix: &str, kind: ResourceKind) -> Scale {
    match suffix {
        "m" => Scale::Multiply(1),
        "K" | "Ki" => Scale::Multiply(KIB),
        "M" | "Mi" => Scale::Multiply(KIB.pow(2)),
        "G" | "Gi" => Scale::Multiply(KIB.pow(3)),
        "T" | "Ti" => Scale::Multiply(KIB.pow(4)),
        "P" | "Pi" => Scale::Multiply(KIB.pow(5)),
        "E" | "Ei" => Scale::Multiply(KIB.pow(6)),
        "u" if kind == ResourceKind::Cpu => Scale::Divide(1_000),
        "n" if kind == ResourceKind::Cpu => Scale::Divide(1_000_000),
        _ => kind.default_scale(),
    }
}

/// Parse a raw quantity string into its canonical amount
///
/// The string must be a non-empty run of ASCII digits optionally followed
/// by a run of ASCII letters. Suffixes outside the unit table fall back to
/// the kind's default scale (whole cores for CPU, bytes for memory).
pub fn parse_quantity(raw: &str, kind: ResourceKind) -> Result<Quantity> {
    let malformed = || Error::MalformedQuantity {
        raw: raw.to_string(),
    };

    let trimmed = raw.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, suffix) = trimmed.split_at(split);

    if digits.is_empty() || !suffix.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(malformed());
    }

    let digits: u128 = digits.parse().map_err(|_| malformed())?;
    let amount = suffix_scale(suffix, kind).apply(digits);

    Ok(Quantity::new(amount, kind))
}

/// Width and precision used when rendering a memory amount
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryFormat {
    pub width: usize,
    pub precision: usize,
}

impl MemoryFormat {
    pub const fn new(width: usize, precision: usize) -> Self {
        Self { width, precision }
    }
}

/// Binary unit labels, smallest first
const MEMORY_UNITS: [&str; 7] = ["Byte", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

/// Pick the largest binary unit for which the scaled value is at least 1
fn best_prefix(bytes: u128) -> (f64, &'static str) {
    let mut exponent = 0;
    while exponent + 1 < MEMORY_UNITS.len() && bytes >= KIB.pow(exponent as u32 + 1) {
        exponent += 1;
    }
    let value = bytes as f64 / KIB.pow(exponent as u32) as f64;
    (value, MEMORY_UNITS[exponent])
}

/// Render a byte amount in the largest fitting binary unit, right-justified
pub fn format_memory(quantity: Quantity, format: MemoryFormat) -> String {
    let (value, unit) = best_prefix(quantity.amount());
    format!(
        "{:>width$.precision$} {}",
        value,
        unit,
        width = format.width,
        precision = format.precision
    )
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ResourceKind::Cpu => write!(f, "{}m", self.amount),
            ResourceKind::Memory => {
                f.write_str(format_memory(*self, MemoryFormat::new(0, 2)).trim_start())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDE: MemoryFormat = MemoryFormat::new(8, 2);

    #[test]
    fn test_parse_milli_cpu() {
        let q = parse_quantity("100m", ResourceKind::Cpu).unwrap();
        assert_eq!(q.amount(), 100);
        assert_eq!(q.kind(), ResourceKind::Cpu);
    }

    #[test]
    fn test_parse_binary_memory() {
        let q = parse_quantity("200Mi", ResourceKind::Memory).unwrap();
        assert_eq!(q.amount(), 200 * (1 << 20));
    }

    #[test]
    fn test_decimal_suffix_matches_binary() {
        for (dec, bin) in [("3K", "3Ki"), ("3M", "3Mi"), ("3G", "3Gi"), ("3E", "3Ei")] {
            assert_eq!(
                parse_quantity(dec, ResourceKind::Memory).unwrap(),
                parse_quantity(bin, ResourceKind::Memory).unwrap()
            );
        }
    }

    #[test]
    fn test_bare_integer_uses_kind_default() {
        assert_eq!(parse_quantity("1", ResourceKind::Cpu).unwrap().amount(), 1000);
        assert_eq!(parse_quantity("1", ResourceKind::Memory).unwrap().amount(), 1);
    }

    #[test]
    fn test_unknown_suffix_uses_kind_default() {
        assert_eq!(parse_quantity("2X", ResourceKind::Cpu).unwrap().amount(), 2000);
        assert_eq!(parse_quantity("2X", ResourceKind::Memory).unwrap().amount(), 2);
    }

    #[test]
    fn test_sub_milli_cpu_rounds_up() {
        assert_eq!(
            parse_quantity("68000000n", ResourceKind::Cpu).unwrap().amount(),
            68
        );
        assert_eq!(parse_quantity("1n", ResourceKind::Cpu).unwrap().amount(), 1);
        assert_eq!(parse_quantity("0n", ResourceKind::Cpu).unwrap().amount(), 0);
        assert_eq!(parse_quantity("2500u", ResourceKind::Cpu).unwrap().amount(), 3);
    }

    #[test]
    fn test_malformed_quantities() {
        for raw in ["", "m", "Mi", "-5", "1.5", "12Mi3", "abc"] {
            let err = parse_quantity(raw, ResourceKind::Memory).unwrap_err();
            assert!(
                matches!(err, Error::MalformedQuantity { .. }),
                "{raw:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_memory(Quantity::bytes(123), WIDE), "  123.00 Byte");
    }

    #[test]
    fn test_format_kibibytes() {
        assert_eq!(
            format_memory(Quantity::bytes(1024 * 12 + 512), WIDE),
            "   12.50 KiB"
        );
    }

    #[test]
    fn test_format_mebibytes() {
        assert_eq!(
            format_memory(Quantity::bytes((1 << 20) * 123 + (1 << 20) / 4), WIDE),
            "  123.25 MiB"
        );
    }

    #[test]
    fn test_format_gibibytes() {
        assert_eq!(
            format_memory(Quantity::bytes((1 << 30) + (1 << 30) / 20), WIDE),
            "    1.05 GiB"
        );
    }

    #[test]
    fn test_format_large_units() {
        assert_eq!(format_memory(Quantity::bytes(100 << 40), WIDE), "  100.00 TiB");
        assert_eq!(format_memory(Quantity::bytes(100 << 50), WIDE), "  100.00 PiB");
        assert_eq!(format_memory(Quantity::bytes(100 << 60), WIDE), "  100.00 EiB");
    }

    #[test]
    fn test_format_zero() {
        assert_eq!(format_memory(Quantity::bytes(0), WIDE), "    0.00 Byte");
    }

    #[test]
    fn test_parse_then_format_keeps_unit_class() {
        let q = parse_quantity("100Ki", ResourceKind::Memory).unwrap();
        assert_eq!(format_memory(q, MemoryFormat::new(4, 0)), " 100 KiB");
    }

    #[test]
    fn test_quantities_rank_by_amount() {
        let mut pairs = vec![
            (Quantity::cpu_millis(100), Quantity::bytes(1024)),
            (Quantity::cpu_millis(300), Quantity::bytes(10)),
            (Quantity::cpu_millis(100), Quantity::bytes(4096)),
        ];
        pairs.sort_by_key(|pair| std::cmp::Reverse(*pair));

        assert_eq!(pairs[0].0, Quantity::cpu_millis(300));
        assert_eq!(pairs[1].1, Quantity::bytes(4096));
        assert!(Quantity::bytes(1) < Quantity::bytes(2));
    }
}
