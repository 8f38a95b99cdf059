//! Flag binding for plugin parameters.
//!
//! Each plugin declares its parameters as a `clap` derive struct with
//! `no_binary_name = true`. Repository configuration supplies the raw
//! argument list; anything absent falls back to the declared default.

use clap::Parser;

use super::PluginError;

/// Parses `args` into `A`, reporting failures against `plugin`.
pub fn bind<A: Parser>(plugin: &str, args: &[String]) -> Result<A, PluginError> {
    A::try_parse_from(args).map_err(|e| PluginError::InvalidArgs {
        plugin: plugin.to_string(),
        message: e.to_string().trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::ArgAction;

    #[derive(Debug, Parser)]
    #[command(no_binary_name = true, disable_help_flag = true)]
    struct FakeArgs {
        #[arg(long, default_value = "default")]
        foo: String,
        #[arg(long, default_value_t = 1)]
        bar: u32,
        #[arg(
            long,
            action = ArgAction::Set,
            default_value_t = false,
            default_missing_value = "true",
            num_args = 0..=1,
            require_equals = true
        )]
        enabled: bool,
        #[arg(long, value_delimiter = ',', default_values = ["a", "b"])]
        list: Vec<String>,
    }

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn overrides_apply() {
        let bound: FakeArgs = bind("fake", &args(&["--foo=xxxx", "--bar=3"])).unwrap();
        assert_eq!(format!("{}-{}", bound.foo, bound.bar), "xxxx-3");
    }

    #[test]
    fn space_separated_values_apply() {
        let bound: FakeArgs = bind("fake", &args(&["--foo", "yyyy", "--bar", "7"])).unwrap();
        assert_eq!(bound.foo, "yyyy");
        assert_eq!(bound.bar, 7);
    }

    #[test]
    fn defaults_fill_gaps() {
        let bound: FakeArgs = bind("fake", &[]).unwrap();
        assert_eq!(bound.foo, "default");
        assert_eq!(bound.bar, 1);
        assert!(!bound.enabled);
        assert_eq!(bound.list, vec!["a", "b"]);
    }

    #[test]
    fn boolean_flag_forms() {
        let bare: FakeArgs = bind("fake", &args(&["--enabled"])).unwrap();
        assert!(bare.enabled);
        let explicit: FakeArgs = bind("fake", &args(&["--enabled=true"])).unwrap();
        assert!(explicit.enabled);
        let off: FakeArgs = bind("fake", &args(&["--enabled=false"])).unwrap();
        assert!(!off.enabled);
    }

    #[test]
    fn lists_split_on_commas() {
        let bound: FakeArgs = bind("fake", &args(&["--list=x,y,z"])).unwrap();
        assert_eq!(bound.list, vec!["x", "y", "z"]);
    }

    #[test]
    fn unknown_flag_is_invalid() {
        let err = bind::<FakeArgs>("fake", &args(&["--nope"])).unwrap_err();
        match err {
            PluginError::InvalidArgs { plugin, message } => {
                assert_eq!(plugin, "fake");
                assert!(message.contains("--nope"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn bad_value_is_invalid() {
        assert!(matches!(
            bind::<FakeArgs>("fake", &args(&["--bar=many"])),
            Err(PluginError::InvalidArgs { .. })
        ));
    }
}
