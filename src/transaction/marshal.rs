//! Per-type serialization protocol for command operands.

use super::parcel::{MarshalError, Parcel};
use crate::common::{Color, RectI, Vector2f, Vector4f};

/// A value that can be written to and read back from a [`Parcel`].
///
/// `unmarshal` must read exactly what `marshal` wrote, in the same order.
pub trait Marshal: Sized {
    fn marshal(&self, parcel: &mut Parcel) -> Result<(), MarshalError>;
    fn unmarshal(parcel: &mut Parcel) -> Result<Self, MarshalError>;
}

macro_rules! impl_marshal_pod {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Marshal for $ty {
                #[inline]
                fn marshal(&self, parcel: &mut Parcel) -> Result<(), MarshalError> {
                    parcel.write_pod(self);
                    Ok(())
                }

                #[inline]
                fn unmarshal(parcel: &mut Parcel) -> Result<Self, MarshalError> {
                    parcel.read_pod()
                }
            }
        )*
    };
}

impl_marshal_pod!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);
impl_marshal_pod!(Vector2f, Vector4f, Color, RectI);

impl Marshal for bool {
    fn marshal(&self, parcel: &mut Parcel) -> Result<(), MarshalError> {
        parcel.write_pod(&(*self as u8));
        Ok(())
    }

    fn unmarshal(parcel: &mut Parcel) -> Result<Self, MarshalError> {
        match parcel.read_pod::<u8>()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(MarshalError::InvalidValue {
                what: "bool",
                value: other as u64,
            }),
        }
    }
}

impl Marshal for String {
    fn marshal(&self, parcel: &mut Parcel) -> Result<(), MarshalError> {
        parcel.write_bytes(self.as_bytes())
    }

    fn unmarshal(parcel: &mut Parcel) -> Result<Self, MarshalError> {
        String::from_utf8(parcel.read_bytes()?).map_err(|_| MarshalError::InvalidUtf8)
    }
}

impl<T: Marshal> Marshal for Vec<T> {
    fn marshal(&self, parcel: &mut Parcel) -> Result<(), MarshalError> {
        parcel.write_len(self.len())?;
        for item in self {
            item.marshal(parcel)?;
        }
        Ok(())
    }

    fn unmarshal(parcel: &mut Parcel) -> Result<Self, MarshalError> {
        let len = parcel.read_pod::<u32>()? as usize;
        // every element occupies at least one byte
        let mut items = Vec::with_capacity(len.min(parcel.remaining()));
        for _ in 0..len {
            items.push(T::unmarshal(parcel)?);
        }
        Ok(items)
    }
}

impl<T: Marshal> Marshal for Option<T> {
    fn marshal(&self, parcel: &mut Parcel) -> Result<(), MarshalError> {
        match self {
            Some(value) => {
                true.marshal(parcel)?;
                value.marshal(parcel)
            }
            None => false.marshal(parcel),
        }
    }

    fn unmarshal(parcel: &mut Parcel) -> Result<Self, MarshalError> {
        if bool::unmarshal(parcel)? {
            Ok(Some(T::unmarshal(parcel)?))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<T: Marshal + PartialEq + std::fmt::Debug>(value: T) {
        let mut parcel = Parcel::new();
        value.marshal(&mut parcel).unwrap();
        let mut reader = Parcel::from_bytes(parcel.into_bytes());
        assert_eq!(T::unmarshal(&mut reader).unwrap(), value);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_boundary_values() {
        round_trip(0u64);
        round_trip(u64::MAX);
        round_trip(i32::MIN);
        round_trip(f32::INFINITY);
        round_trip(Vector4f::default());
        round_trip(String::new());
        round_trip("layer ✓".to_string());
        round_trip(Vec::<u64>::new());
        round_trip(vec![Some(1u32), None, Some(u32::MAX)]);
    }

    #[test]
    fn test_nan_keeps_its_bits() {
        let nan = f32::from_bits(0x7fc0_1234);
        let mut parcel = Parcel::new();
        nan.marshal(&mut parcel).unwrap();
        let mut reader = Parcel::from_bytes(parcel.into_bytes());
        assert_eq!(f32::unmarshal(&mut reader).unwrap().to_bits(), 0x7fc0_1234);
    }

    #[test]
    fn test_invalid_bool_is_rejected() {
        let mut parcel = Parcel::from_bytes(vec![2]);
        assert_eq!(
            bool::unmarshal(&mut parcel),
            Err(MarshalError::InvalidValue {
                what: "bool",
                value: 2
            })
        );
    }

    #[test]
    fn test_truncated_vec_fails() {
        let mut parcel = Parcel::new();
        vec![1u32, 2, 3].marshal(&mut parcel).unwrap();
        let mut bytes = parcel.into_bytes();
        bytes.truncate(bytes.len() - 2);
        let mut reader = Parcel::from_bytes(bytes);
        assert!(Vec::<u32>::unmarshal(&mut reader).is_err());
    }
}
