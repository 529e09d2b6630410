/// Configuration macros for zero-repetition config definitions
///
/// `config_struct!` defines a configuration struct with each field's default
/// value written next to the field. It generates:
/// - The struct with public fields
/// - The Default implementation
/// - Serde support with `#[serde(default)]`, so partial TOML files work
///
/// # Example
/// ```
/// chainpulse::config_struct! {
///     pub struct ProbeConfig {
///         enabled: bool = true,
///         timeout_ms: u64 = 5000,
///     }
/// }
///
/// let cfg = ProbeConfig::default();
/// assert_eq!(cfg.timeout_ms, 5000);
/// ```
#[macro_export]
macro_rules! config_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_name:ident: $field_type:ty = $default_value:expr
            ),*
            $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        #[serde(default)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                pub $field_name: $field_type,
            )*
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    $(
                        $field_name: $default_value,
                    )*
                }
            }
        }
    };
}
