//! CLI and validated configuration for both binaries.

pub mod node;
pub mod sink;
pub mod tls;

pub use node::NodeArgs;
pub use sink::SinkArgs;
pub use tls::TlsArgs;

use std::time::Duration;

/// Minimal `200ms`/`5s`/`1m` duration parser for clap args, avoiding a
/// dependency on `humantime` for this one use site.
pub(crate) fn duration_arg(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let split_at = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| format!("invalid duration: {s}"))?;
    let (num, unit) = s.split_at(split_at);
    let n: u64 = num.parse().map_err(|_| format!("invalid duration: {s}"))?;
    match unit {
        "ms" => Ok(Duration::from_millis(n)),
        "s" => Ok(Duration::from_secs(n)),
        "m" => Ok(Duration::from_secs(n * 60)),
        _ => Err(format!("invalid duration: {s}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_arg_handles_common_suffixes() {
        assert_eq!(duration_arg("200ms").unwrap(), Duration::from_millis(200));
        assert_eq!(duration_arg("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(duration_arg("1m").unwrap(), Duration::from_secs(60));
    }

    #[test]
    fn duration_arg_rejects_unknown_unit() {
        assert!(duration_arg("5x").is_err());
    }
}
