//! Monetary amounts, stored internally as integer cents to avoid the
//! rounding drift of floating point, but serialized per spec §6 as *both* an
//! IEEE 754 double and a fixed-two-decimal string -- readers must accept
//! either and prefer the string form when the two disagree.

use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A non-negative monetary amount, in integer cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Builds an amount from a non-negative dollar value, rounding to the
    /// nearest cent. Negative input is clamped to zero -- callers that must
    /// reject negative amounts should check before constructing.
    pub fn from_dollars(dollars: f64) -> Amount {
        let cents = (dollars.max(0.0) * 100.0).round() as u64;
        Amount(cents)
    }

    pub fn from_cents(cents: u64) -> Amount {
        Amount(cents)
    }

    pub fn cents(self) -> u64 {
        self.0
    }

    pub fn as_dollars(self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn fixed_two_decimal(self) -> String {
        format!("{}.{:02}", self.0 / 100, self.0 % 100)
    }

    fn parse_fixed(s: &str) -> Option<u64> {
        let s = s.trim();
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        let whole: u64 = whole.parse().ok()?;
        let cents: u64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<u64>().ok()? * 10,
            _ => frac[..2].parse().ok()?,
        };
        Some(whole * 100 + cents)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fixed_two_decimal())
    }
}

/// A signed running total (the round balance), which the sum of credits and
/// debits can legitimately drive negative under `businessRejectOnNegativeBalance
/// = false` test configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct SignedAmount(i64);

impl SignedAmount {
    pub fn from_cents(cents: i64) -> Self {
        SignedAmount(cents)
    }

    pub fn cents(self) -> i64 {
        self.0
    }

    pub fn as_dollars(self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn checked_add_amount(self, amount: Amount) -> Self {
        SignedAmount(self.0 + amount.cents() as i64)
    }

    pub fn checked_sub_amount(self, amount: Amount) -> Self {
        SignedAmount(self.0 - amount.cents() as i64)
    }
}

impl fmt::Display for SignedAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut s = serializer.serialize_struct("Amount", 2)?;
        s.serialize_field("numeric", &self.as_dollars())?;
        s.serialize_field("display", &self.fixed_two_decimal())?;
        s.end()
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct AmountVisitor;

        impl<'de> Visitor<'de> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an amount object with `numeric` and/or `display` fields")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Amount, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut numeric: Option<f64> = None;
                let mut display: Option<String> = None;
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "numeric" => numeric = Some(map.next_value()?),
                        "display" => display = Some(map.next_value()?),
                        _ => {
                            let _ignored: serde::de::IgnoredAny = map.next_value()?;
                        }
                    }
                }
                // Spec §6: prefer the string form when both are present and disagree.
                if let Some(display) = display {
                    if let Some(cents) = Amount::parse_fixed(&display) {
                        return Ok(Amount(cents));
                    }
                }
                if let Some(numeric) = numeric {
                    return Ok(Amount::from_dollars(numeric));
                }
                Err(de::Error::custom(
                    "amount object had neither a valid `display` nor `numeric` field",
                ))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Amount, E>
            where
                E: de::Error,
            {
                Ok(Amount::from_dollars(v))
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_two_decimal_formats_cents() {
        assert_eq!(Amount::from_cents(1234).fixed_two_decimal(), "12.34");
        assert_eq!(Amount::from_cents(5).fixed_two_decimal(), "0.05");
    }

    #[test]
    fn from_dollars_rounds_to_cent() {
        assert_eq!(Amount::from_dollars(12.345).cents(), 1235);
        assert_eq!(Amount::from_dollars(-5.0), Amount::ZERO);
    }

    #[test]
    fn roundtrips_through_json() {
        let amount = Amount::from_dollars(42.5);
        let json = serde_json::to_value(amount).unwrap();
        let back: Amount = serde_json::from_value(json).unwrap();
        assert_eq!(amount, back);
    }

    #[test]
    fn display_form_wins_on_disagreement() {
        let value = serde_json::json!({"numeric": 1.0, "display": "9.99"});
        let amount: Amount = serde_json::from_value(value).unwrap();
        assert_eq!(amount, Amount::from_cents(999));
    }

    #[test]
    fn accepts_bare_numeric() {
        let value = serde_json::json!(3.5);
        let amount: Amount = serde_json::from_value(value).unwrap();
        assert_eq!(amount, Amount::from_dollars(3.5));
    }
}
