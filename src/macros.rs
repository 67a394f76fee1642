//! Declarative helpers for code tables shared across the crate.

/// Defines numeric error code constants and a `get_error_message` lookup.
macro_rules! define_error_codes {
    ($($name:ident = $code:literal => $msg:literal),* $(,)?) => {
        $(
            #[doc = $msg]
            pub const $name: u32 = $code;
        )*

        /// Returns the human-readable message for an error code.
        pub fn get_error_message(code: u32) -> &'static str {
            match code {
                $($code => $msg,)*
                _ => "Unknown Error",
            }
        }
    };
}

/// Defines the `Region` enum with its short code, display name and API endpoint.
macro_rules! define_regions {
    ($($variant:ident = ($code:literal, $name:literal, $endpoint:literal)),* $(,)?) => {
        /// Tuya cloud data center.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Region {
            $(
                #[doc = $name]
                $variant,
            )*
        }

        impl Region {
            /// Every supported region.
            pub const ALL: &'static [Region] = &[$(Region::$variant,)*];

            /// Short region code, e.g. `eu`.
            pub fn code(&self) -> &'static str {
                match self {
                    $(Region::$variant => $code,)*
                }
            }

            /// Human-readable data center name.
            pub fn name(&self) -> &'static str {
                match self {
                    $(Region::$variant => $name,)*
                }
            }

            /// Base URL of the Open API for this region.
            pub fn endpoint(&self) -> &'static str {
                match self {
                    $(Region::$variant => $endpoint,)*
                }
            }
        }

        impl std::str::FromStr for Region {
            type Err = $crate::error::TuyaError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($code => Ok(Region::$variant),)*
                    _ => Err($crate::error::TuyaError::UnknownRegion(s.to_string())),
                }
            }
        }

        impl std::fmt::Display for Region {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.code())
            }
        }
    };
}
