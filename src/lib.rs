//! Library crate root re-exporting the config, program and runtime modules.

#[path = "lib/mod.rs"]
pub mod lib_mod;
pub use lib_mod as lib;
pub mod cli;
pub mod config;
pub mod program;
pub mod runtime;

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    fn assert_split_layout(label: &str, mod_path: &str, files: &[&str], needles: &[&str]) {
        for path in files {
            assert!(Path::new(path).exists(), "{label} layout: {path} must exist");
        }

        let content = fs::read_to_string(mod_path)
            .unwrap_or_else(|_| panic!("{label} layout: failed to read {mod_path}"));
        for needle in needles {
            assert!(
                content.contains(needle),
                "{label} layout: {mod_path} must declare {needle}"
            );
        }
    }

    #[test]
    fn config_layout_requires_split_modules() {
        assert_split_layout(
            "config",
            "src/config/mod.rs",
            &[
                "src/config/compose.rs",
                "src/config/defaults.rs",
                "src/config/hydra.rs",
                "src/config/interpolation.rs",
                "src/config/node.rs",
                "src/config/overrides.rs",
            ],
            &["compose", "defaults", "hydra", "interpolation", "node", "overrides"],
        );
    }

    #[test]
    fn program_layout_requires_split_modules() {
        assert_split_layout(
            "program",
            "src/program/mod.rs",
            &[
                "src/program/arguments.rs",
                "src/program/builtin.rs",
                "src/program/registry.rs",
                "src/program/serialization.rs",
            ],
            &["arguments", "builtin", "registry", "serialization"],
        );
    }

    #[test]
    fn cli_layout_requires_split_modules() {
        assert_split_layout(
            "CLI",
            "src/cli/mod.rs",
            &["src/cli/args.rs", "src/cli/profile.rs"],
            &["RunArgs", "InitArgs", "RunProfile"],
        );
    }

    #[test]
    fn bundled_templates_are_shipped() {
        assert_split_layout(
            "templates",
            "config_templates/hprun.yaml",
            &[
                "config_templates/program/echo.yaml",
                "config_templates/program/command.yaml",
                "config_templates/program/sequence.yaml",
            ],
            &["defaults", "_self_"],
        );
    }
}
