//! Signal types, external values, and the codec between them.
//!
//! Every signal is stored internally as a uniform [`LogicVec`] encoding:
//! integers as 64-bit two's complement, enumeration values as a 32-bit
//! index, reals as their IEEE 754 bit pattern, logic as itself. The codec
//! converts between that encoding and the external tagged [`Value`],
//! rejecting incompatible formats and out-of-domain writes.

use kairos_common::{ArenaId, Ident, Logic, LogicVec};
use serde::{Deserialize, Serialize};

use crate::error::HpiError;

/// Opaque ID for a signal in the kernel's flat signal table.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct SignalId(u32);

impl ArenaId for SignalId {
    fn from_raw(index: u32) -> Self {
        Self(index)
    }

    fn as_raw(self) -> u32 {
        self.0
    }
}

/// A signal's declared type, fixing its value domain.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub enum SignalType {
    /// A ranged integer; both bounds inclusive.
    Int {
        /// Lower bound.
        lo: i64,
        /// Upper bound.
        hi: i64,
    },
    /// A single nine-value logic scalar.
    Logic,
    /// A vector of nine-value logic scalars.
    LogicVec {
        /// Number of scalars.
        width: u32,
    },
    /// A floating-point value.
    Real,
    /// An enumeration; values are indices into the literal list.
    Enum {
        /// The enumeration literals, leftmost first.
        literals: Vec<String>,
    },
}

impl SignalType {
    /// Short noun for diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            SignalType::Int { .. } => "integer",
            SignalType::Logic => "logic",
            SignalType::LogicVec { .. } => "logic vector",
            SignalType::Real => "real",
            SignalType::Enum { .. } => "enumeration",
        }
    }

    /// The format this type natively decodes to.
    pub fn native_format(&self) -> Format {
        match self {
            SignalType::Int { .. } => Format::Int,
            SignalType::Logic => Format::Logic,
            SignalType::LogicVec { .. } => Format::LogicVec,
            SignalType::Real => Format::Real,
            SignalType::Enum { .. } => Format::Enum,
        }
    }

    /// The default initial value of a freshly elaborated signal: the
    /// leftmost value of the declared domain for scalar domains,
    /// uninitialized `U` for logic.
    pub fn default_value(&self) -> Value {
        match self {
            SignalType::Int { lo, .. } => Value::Int(*lo),
            SignalType::Logic => Value::Logic(Logic::U),
            SignalType::LogicVec { width } => Value::LogicVec(LogicVec::new(*width)),
            SignalType::Real => Value::Real(0.0),
            SignalType::Enum { .. } => Value::Enum(0),
        }
    }
}

/// The format tag a caller requests values in.
///
/// `ObjType` asks for whatever the signal's declared type natively decodes
/// to, letting a caller read a signal without knowing its type up front.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Format {
    /// The signal's native format.
    ObjType,
    /// 64-bit signed integer.
    Int,
    /// A single logic scalar.
    Logic,
    /// A logic vector.
    LogicVec,
    /// A floating-point value.
    Real,
    /// An enumeration index.
    Enum,
}

impl Format {
    /// Short noun for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Format::ObjType => "object type",
            Format::Int => "integer",
            Format::Logic => "logic",
            Format::LogicVec => "logic vector",
            Format::Real => "real",
            Format::Enum => "enumeration",
        }
    }
}

/// An external value crossing the procedural interface boundary.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub enum Value {
    /// Exact 64-bit signed integer.
    Int(i64),
    /// A single logic scalar.
    Logic(Logic),
    /// A logic vector.
    LogicVec(LogicVec),
    /// A floating-point value.
    Real(f64),
    /// An enumeration index.
    Enum(u32),
}

impl Value {
    /// The format tag describing this value.
    pub fn format(&self) -> Format {
        match self {
            Value::Int(_) => Format::Int,
            Value::Logic(_) => Format::Logic,
            Value::LogicVec(_) => Format::LogicVec,
            Value::Real(_) => Format::Real,
            Value::Enum(_) => Format::Enum,
        }
    }
}

/// How a value write interacts with the signal's drivers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum PutMode {
    /// Deposit the value respecting other updates in the same delta.
    Deposit,
    /// Override any same-delta deposit; visible at the next delta cycle.
    ForcePropagate,
}

/// Runtime state of one signal: declared type, current and prior encoding.
///
/// The prior value is kept per applied instant for change detection —
/// value-change callbacks fire once per delta cycle in which `value`
/// differs from `previous_value` before the update.
#[derive(Clone, Debug)]
pub struct SimSignalState {
    /// Interned signal name.
    pub name: Ident,
    /// Declared type.
    pub ty: SignalType,
    /// Current encoded value.
    pub value: LogicVec,
    /// Encoded value before the most recent applied update.
    pub previous_value: LogicVec,
}

impl SimSignalState {
    /// Creates signal state with the given initial value, or the type's
    /// default when `init` is `None`.
    pub fn new(name: Ident, ty: SignalType, init: Option<&Value>) -> Result<Self, HpiError> {
        let default;
        let init = match init {
            Some(v) => v,
            None => {
                default = ty.default_value();
                &default
            }
        };
        let encoded = encode(init, &ty)?;
        Ok(Self {
            name,
            ty,
            previous_value: encoded.clone(),
            value: encoded,
        })
    }
}

fn mismatch(value: &Value, ty: &SignalType) -> HpiError {
    HpiError::FormatMismatch {
        requested: value.format().name().into(),
        declared: ty.describe().into(),
    }
}

/// Encodes an external value into a signal's internal representation.
///
/// Checks the declared domain: integer bounds, vector widths, enumeration
/// index range. Incompatible format pairings report `FormatMismatch`;
/// compatible pairings with out-of-domain payloads report `OutOfRange`.
pub fn encode(value: &Value, ty: &SignalType) -> Result<LogicVec, HpiError> {
    match (value, ty) {
        (Value::Int(v), SignalType::Int { lo, hi }) => {
            if v < lo || v > hi {
                return Err(HpiError::OutOfRange {
                    reason: format!("{v} not in {lo}..={hi}"),
                });
            }
            Ok(LogicVec::from_i64(*v))
        }
        (Value::Int(v), SignalType::LogicVec { width }) => {
            let fits = *v >= 0 && (*width >= 64 || (*v as u64) < (1u64 << width));
            if !fits {
                return Err(HpiError::OutOfRange {
                    reason: format!("{v} does not fit in {width} bits"),
                });
            }
            Ok(LogicVec::from_u64(*v as u64, *width))
        }
        (Value::Int(v), SignalType::Logic) => match v {
            0 => Ok(LogicVec::from_bool(false)),
            1 => Ok(LogicVec::from_bool(true)),
            _ => Err(HpiError::OutOfRange {
                reason: format!("{v} is not a logic scalar"),
            }),
        },
        (Value::Logic(l), SignalType::Logic) => Ok(LogicVec::filled(1, *l)),
        (Value::Logic(l), SignalType::LogicVec { width: 1 }) => Ok(LogicVec::filled(1, *l)),
        (Value::LogicVec(v), SignalType::LogicVec { width }) => {
            if v.width() != *width {
                return Err(HpiError::OutOfRange {
                    reason: format!("width {} does not match declared width {width}", v.width()),
                });
            }
            Ok(v.clone())
        }
        (Value::LogicVec(v), SignalType::Logic) if v.width() == 1 => Ok(v.clone()),
        (Value::LogicVec(v), SignalType::Int { lo, hi }) => {
            let Some(int) = v.to_i64() else {
                return Err(mismatch(value, ty));
            };
            if int < *lo || int > *hi {
                return Err(HpiError::OutOfRange {
                    reason: format!("{int} not in {lo}..={hi}"),
                });
            }
            Ok(LogicVec::from_i64(int))
        }
        (Value::Real(r), SignalType::Real) => Ok(LogicVec::from_u64(r.to_bits(), 64)),
        (Value::Enum(i), SignalType::Enum { literals }) => {
            if (*i as usize) >= literals.len() {
                return Err(HpiError::OutOfRange {
                    reason: format!("index {i} exceeds {} literals", literals.len()),
                });
            }
            Ok(LogicVec::from_u64(u64::from(*i), 32))
        }
        _ => Err(mismatch(value, ty)),
    }
}

/// Decodes a signal's internal representation into the requested format.
///
/// `Format::ObjType` resolves to the signal's native format. The only
/// cross-format reads are definite logic to integer (enumeration indices
/// included) and integer to logic vector; everything else reports
/// `FormatMismatch`. Never mutates anything.
pub fn decode(stored: &LogicVec, ty: &SignalType, requested: Format) -> Result<Value, HpiError> {
    let requested = match requested {
        Format::ObjType => ty.native_format(),
        f => f,
    };
    let reject = || HpiError::FormatMismatch {
        requested: requested.name().into(),
        declared: ty.describe().into(),
    };
    let indefinite = || HpiError::FormatMismatch {
        requested: requested.name().into(),
        declared: "indefinite logic".into(),
    };

    match (requested, ty) {
        (Format::Int, SignalType::Int { .. }) => {
            Ok(Value::Int(stored.to_i64().ok_or_else(indefinite)?))
        }
        (Format::Int, SignalType::Logic) => {
            let bit = stored.get(0).to_bool().ok_or_else(indefinite)?;
            Ok(Value::Int(i64::from(bit)))
        }
        (Format::Int, SignalType::LogicVec { .. }) => {
            let raw = stored.to_u64().ok_or_else(indefinite)?;
            Ok(Value::Int(raw as i64))
        }
        (Format::Int, SignalType::Enum { .. }) => {
            let raw = stored.to_u64().ok_or_else(indefinite)?;
            Ok(Value::Int(raw as i64))
        }
        (Format::Logic, SignalType::Logic) => Ok(Value::Logic(stored.get(0))),
        (Format::Logic, SignalType::LogicVec { width: 1 }) => Ok(Value::Logic(stored.get(0))),
        (Format::LogicVec, SignalType::LogicVec { .. })
        | (Format::LogicVec, SignalType::Logic)
        | (Format::LogicVec, SignalType::Int { .. }) => Ok(Value::LogicVec(stored.clone())),
        (Format::Real, SignalType::Real) => {
            let bits = stored.to_u64().ok_or_else(indefinite)?;
            Ok(Value::Real(f64::from_bits(bits)))
        }
        (Format::Enum, SignalType::Enum { .. }) => {
            let raw = stored.to_u64().ok_or_else(indefinite)?;
            Ok(Value::Enum(raw as u32))
        }
        _ => Err(reject()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kairos_common::Interner;

    fn int_ty() -> SignalType {
        SignalType::Int { lo: 0, hi: 100 }
    }

    #[test]
    fn signal_id_roundtrip() {
        let id = SignalId::from_raw(9);
        assert_eq!(id.as_raw(), 9);
    }

    #[test]
    fn int_encode_decode() {
        let stored = encode(&Value::Int(42), &int_ty()).unwrap();
        assert_eq!(
            decode(&stored, &int_ty(), Format::Int).unwrap(),
            Value::Int(42)
        );
        assert_eq!(
            decode(&stored, &int_ty(), Format::ObjType).unwrap(),
            Value::Int(42)
        );
    }

    #[test]
    fn int_negative_in_range() {
        let ty = SignalType::Int { lo: -10, hi: 10 };
        let stored = encode(&Value::Int(-7), &ty).unwrap();
        assert_eq!(decode(&stored, &ty, Format::Int).unwrap(), Value::Int(-7));
    }

    #[test]
    fn int_out_of_range() {
        let err = encode(&Value::Int(101), &int_ty()).unwrap_err();
        assert!(matches!(err, HpiError::OutOfRange { .. }));
        let err = encode(&Value::Int(-1), &int_ty()).unwrap_err();
        assert!(matches!(err, HpiError::OutOfRange { .. }));
    }

    #[test]
    fn format_mismatch_reported() {
        let err = encode(&Value::Real(1.0), &int_ty()).unwrap_err();
        assert!(matches!(err, HpiError::FormatMismatch { .. }));
        let stored = encode(&Value::Int(1), &int_ty()).unwrap();
        let err = decode(&stored, &int_ty(), Format::Real).unwrap_err();
        assert!(matches!(err, HpiError::FormatMismatch { .. }));
    }

    #[test]
    fn logic_scalar_roundtrip() {
        let stored = encode(&Value::Logic(Logic::H), &SignalType::Logic).unwrap();
        assert_eq!(
            decode(&stored, &SignalType::Logic, Format::Logic).unwrap(),
            Value::Logic(Logic::H)
        );
        // Weak high reads as integer 1
        assert_eq!(
            decode(&stored, &SignalType::Logic, Format::Int).unwrap(),
            Value::Int(1)
        );
    }

    #[test]
    fn vector_roundtrip_and_coercions() {
        let ty = SignalType::LogicVec { width: 8 };
        let stored = encode(&Value::Int(5), &ty).unwrap();
        assert_eq!(
            decode(&stored, &ty, Format::ObjType).unwrap(),
            Value::LogicVec(LogicVec::from_u64(5, 8))
        );
        assert_eq!(decode(&stored, &ty, Format::Int).unwrap(), Value::Int(5));
    }

    #[test]
    fn vector_width_is_domain_checked() {
        let ty = SignalType::LogicVec { width: 8 };
        let narrow = Value::LogicVec(LogicVec::all_zero(4));
        assert!(matches!(
            encode(&narrow, &ty).unwrap_err(),
            HpiError::OutOfRange { .. }
        ));
        let big = Value::Int(256);
        assert!(matches!(
            encode(&big, &ty).unwrap_err(),
            HpiError::OutOfRange { .. }
        ));
    }

    #[test]
    fn indefinite_vector_rejects_int_read() {
        let ty = SignalType::LogicVec { width: 4 };
        let stored = LogicVec::new(4); // all U
        assert!(matches!(
            decode(&stored, &ty, Format::Int).unwrap_err(),
            HpiError::FormatMismatch { .. }
        ));
    }

    #[test]
    fn real_bit_pattern_roundtrip() {
        let stored = encode(&Value::Real(-2.5), &SignalType::Real).unwrap();
        assert_eq!(
            decode(&stored, &SignalType::Real, Format::ObjType).unwrap(),
            Value::Real(-2.5)
        );
    }

    #[test]
    fn enum_roundtrip_and_position_read() {
        let ty = SignalType::Enum {
            literals: vec!["idle".into(), "busy".into(), "done".into()],
        };
        let stored = encode(&Value::Enum(2), &ty).unwrap();
        assert_eq!(decode(&stored, &ty, Format::Enum).unwrap(), Value::Enum(2));
        // Position number is readable as an integer
        assert_eq!(decode(&stored, &ty, Format::Int).unwrap(), Value::Int(2));
        assert!(matches!(
            encode(&Value::Enum(3), &ty).unwrap_err(),
            HpiError::OutOfRange { .. }
        ));
    }

    #[test]
    fn default_values() {
        assert_eq!(int_ty().default_value(), Value::Int(0));
        assert_eq!(
            SignalType::Int { lo: -5, hi: 5 }.default_value(),
            Value::Int(-5)
        );
        assert_eq!(SignalType::Logic.default_value(), Value::Logic(Logic::U));
    }

    #[test]
    fn signal_state_defaults_to_leftmost() {
        let interner = Interner::new();
        let name = interner.intern("count");
        let s = SimSignalState::new(name, int_ty(), None).unwrap();
        assert_eq!(decode(&s.value, &s.ty, Format::Int).unwrap(), Value::Int(0));
        assert_eq!(s.previous_value, s.value);
    }

    #[test]
    fn signal_state_rejects_bad_init() {
        let interner = Interner::new();
        let name = interner.intern("count");
        assert!(SimSignalState::new(name, int_ty(), Some(&Value::Int(999))).is_err());
    }

    #[test]
    fn serde_roundtrip_value() {
        let v = Value::LogicVec(LogicVec::from_u64(9, 4));
        let json = serde_json::to_string(&v).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v, back);
    }
}
