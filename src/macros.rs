/// Declares a `#[repr(i32)]`-shaped enum together with a `from_i16` checked
/// constructor returning [`crate::error::PclError::InvalidParameters`] on an
/// unrecognized discriminant.
///
/// This is the integer-keyed half of the teacher's `pdf_enum!` macro
/// (`$variant = $val` mapping an integer to a checked enum); the name-keyed
/// half doesn't apply here, since PCL command arguments are numeric, not
/// dictionary keys.
#[macro_export]
macro_rules! pcl_enum {
    (
        $(#[$attr:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$doc:meta])*
                $variant:ident = $val:literal
            ),*,
        }
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        $vis enum $name {
            $(
                $(#[$doc])*
                $variant = $val
            ),*,
        }

        impl $name {
            pub fn from_i16(v: i16) -> $crate::error::PclResult<Self> {
                Ok(match v {
                    $($val => Self::$variant),*,
                    other => return Err($crate::error::PclError::invalid(format!(
                        "unrecognized value {other} for {}",
                        stringify!($name)
                    ))),
                })
            }
        }
    };
}
