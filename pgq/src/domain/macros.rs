//! Defines helper macros for generating domain error enums.

macro_rules! define_domain_error {
    (@ctor $variant:ident) => {
        ::paste::paste! {
            /// Construct this error variant.
            pub fn [<$variant:snake>]() -> Self {
                Self::$variant
            }
        }
    };

    (@ctor $variant:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        define_domain_error!(@ctor_impl $variant () () $( $field : $ty, )*);
    };

    (@ctor_impl $variant:ident ($($params:tt)*) ($($inits:tt)*) ) => {
        ::paste::paste! {
            /// Construct this error variant.
            pub fn [<$variant:snake>]($($params)*) -> Self {
                Self::$variant { $($inits)* }
            }
        }
    };

    (@ctor_impl $variant:ident ($($params:tt)*) ($($inits:tt)*) $field:ident : $ty:ty, $($rest:tt)*) => {
        define_domain_error!(
            @ctor_impl
            $variant
            ($($params)* $field: impl Into<$ty>,)
            ($($inits)* $field: $field.into(),)
            $($rest)*
        );
    };
    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $( {
                    $(
                        $(#[$field_meta:meta])*
                        $field:ident : $ty:ty
                    ),* $(,)?
                } )? => $message:expr
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant $( { $( $(#[$field_meta])* $field : $ty ),* } )?,
            )*
        }

        impl $name {
            $(
                define_domain_error!(@ctor $variant $( { $($field : $ty),* } )?);
            )*
        }
    };
}

pub(crate) use define_domain_error;

#[cfg(test)]
mod tests {
    //! Regression coverage for the generated constructors.
    define_domain_error! {
        pub enum ExampleError {
            Plain => "plain failure",
            Named {
                /// Offending value.
                value: String,
            } => "named: {value}",
            Sized {
                /// Offending value.
                value: String,
                /// Observed length.
                length: usize,
            } => "sized: {value} ({length})",
        }
    }

    #[test]
    fn constructors_accept_str_for_string_fields() {
        let err = ExampleError::named("hello");
        assert_eq!(err.to_string(), "named: hello");
    }

    #[test]
    fn unit_variants_get_a_constructor() {
        assert_eq!(ExampleError::plain(), ExampleError::Plain);
    }

    #[test]
    fn constructors_support_mixed_fields() {
        let err = ExampleError::sized("hello", 42_usize);
        assert_eq!(err.to_string(), "sized: hello (42)");
    }
}
