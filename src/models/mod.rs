// Models module - response shapes for both game surfaces

pub mod crew;
pub mod fleet;
pub mod map;
pub mod target;

pub use crew::*;
pub use fleet::*;
pub use map::*;
pub use target::*;

/// The backend is loose about numbers: the same id arrives as `7` in one
/// response and `"7"` in the next. These helpers accept either.
pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Int(i64),
        Float(f64),
        Text(String),
        Flag(bool),
    }

    fn to_i64<E: Error>(loose: Loose) -> Result<i64, E> {
        match loose {
            Loose::Int(n) => Ok(n),
            Loose::Float(f) if f.fract() == 0.0 => Ok(f as i64),
            Loose::Float(f) => Err(E::custom(format!("expected an integer, got {}", f))),
            Loose::Text(s) => s.trim().parse().map_err(|_| E::custom(format!("expected an integer, got {:?}", s))),
            Loose::Flag(b) => Ok(b as i64),
        }
    }

    pub fn int<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        to_i64(Loose::deserialize(d)?)
    }

    pub fn uint<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
        let n = to_i64(Loose::deserialize(d)?)?;
        u32::try_from(n).map_err(|_| D::Error::custom(format!("{} out of range", n)))
    }

    pub fn opt_int<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        match Option::<Loose>::deserialize(d)? {
            Some(loose) => to_i64(loose).map(Some),
            None => Ok(None),
        }
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(match Loose::deserialize(d)? {
            Loose::Int(n) => n.to_string(),
            Loose::Float(f) => f.to_string(),
            Loose::Text(s) => s,
            Loose::Flag(b) => b.to_string(),
        })
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Option::<Loose>::deserialize(d)? {
            Some(Loose::Int(n)) => Some(n.to_string()),
            Some(Loose::Float(f)) => Some(f.to_string()),
            Some(Loose::Text(s)) => Some(s),
            Some(Loose::Flag(b)) => Some(b.to_string()),
            None => None,
        })
    }

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(match Loose::deserialize(d)? {
            Loose::Flag(b) => b,
            Loose::Int(n) => n != 0,
            Loose::Float(f) => f != 0.0,
            Loose::Text(s) => !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false")),
        })
    }
}
