//! Configuration discovery and effective settings resolution.
//!
//! Refcheck reads `refcheck.toml|yaml|yml` from the project root (or closest
//! ancestor) and merges it with CLI flags to produce an `Effective` config.
//! Defaults:
//! - `include`: `["**/*.md"]`, `exclude`: none
//! - `checkers.enabled`: `["image"]`
//! - `resolver.kind`: `default`
//! - `output.format`: `human`, `output.context_lines`: 3
//! - `fix.patch_dir`: `.refcheck/patches`
//!
//! Overrides precedence: CLI > config file > defaults. `--include` and
//! `--exclude` globs are appended to the configured lists.

use crate::checks::{self, CheckerOptions};
use crate::error::{Error, Result};
use crate::output::RenderOptions;
use crate::patch::{PatchEngine, PatchStore};
use crate::resolve;
use crate::runner::{ScanConfig, ShellHooks};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const CONFIG_NAMES: [&str; 3] = ["refcheck.toml", "refcheck.yaml", "refcheck.yml"];

#[derive(Debug, Default, Deserialize, Clone)]
/// Root configuration loaded from `refcheck.toml|yaml`.
pub struct FileConfig {
    /// Project root, relative to the config file.
    pub root: Option<String>,
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    #[serde(default)]
    pub checkers: CheckersCfg,
    #[serde(default)]
    pub resolver: ResolverCfg,
    #[serde(default)]
    pub output: OutputCfg,
    #[serde(default)]
    pub fix: FixCfg,
    #[serde(default)]
    pub hooks: HooksCfg,
}

#[derive(Debug, Default, Deserialize, Clone)]
/// `[checkers]`: ordered checker names plus per-checker option tables.
pub struct CheckersCfg {
    pub enabled: Option<Vec<String>>,
    pub image: Option<CheckerOptions>,
    pub link: Option<CheckerOptions>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct ResolverCfg {
    pub kind: Option<String>,
    pub post_dirs: Option<Vec<String>>,
    pub asset_folder_per_post: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct OutputCfg {
    pub format: Option<String>,
    pub context_lines: Option<usize>,
    pub show_suggestions: Option<bool>,
    pub color: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct FixCfg {
    pub patch_dir: Option<String>,
    pub dry_run: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct HooksCfg {
    #[serde(default)]
    pub before_check: Vec<String>,
    #[serde(default)]
    pub after_check: Vec<String>,
}

#[derive(Debug, Default, Clone)]
/// Values given on the command line. Empty lists mean "not given".
pub struct Overrides {
    pub root: Option<String>,
    pub config: Option<String>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub checkers: Vec<String>,
    pub output: Option<String>,
    pub dry_run: Option<bool>,
    pub quiet: bool,
}

#[derive(Debug, Clone)]
/// Fully-resolved configuration used by commands after applying precedence.
pub struct Effective {
    pub root: PathBuf,
    /// The config file that was loaded, if any.
    pub config_file: Option<PathBuf>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub checkers: Vec<String>,
    pub image: CheckerOptions,
    pub link: CheckerOptions,
    pub resolver_kind: String,
    pub post_dirs: Vec<String>,
    pub asset_folder_per_post: bool,
    pub render: RenderOptions,
    pub patch_dir: PathBuf,
    pub dry_run: bool,
    pub hooks: HooksCfg,
}

/// Walk upward from `start` to detect the project root.
///
/// Stops when a `refcheck.toml|yaml|yml` or a `.git` directory is found.
pub fn detect_root(start: &Path) -> PathBuf {
    let mut cur = start;
    loop {
        if CONFIG_NAMES.iter().any(|n| cur.join(n).exists()) {
            return cur.to_path_buf();
        }
        if cur.join(".git").exists() {
            return cur.to_path_buf();
        }
        match cur.parent() {
            Some(p) => cur = p,
            None => return start.to_path_buf(),
        }
    }
}

/// Parse one config file; the format follows the extension.
pub fn load_file(path: &Path) -> Result<FileConfig> {
    let s = fs::read_to_string(path).map_err(|e| Error::storage("read", path, e))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    if is_yaml {
        serde_yaml::from_str(&s)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    } else {
        toml::from_str(&s).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }
}

/// Load `refcheck.toml` or `refcheck.yaml|yml` from `root` if present.
pub fn load_config(root: &Path) -> Result<Option<(PathBuf, FileConfig)>> {
    for name in CONFIG_NAMES {
        let p = root.join(name);
        if p.exists() {
            let cfg = load_file(&p)?;
            return Ok(Some((p, cfg)));
        }
    }
    Ok(None)
}

fn check_choice(key: &str, value: &str, allowed: &[&str]) -> Result<()> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "{} must be one of {}, got '{}'",
            key,
            allowed.join("|"),
            value
        )))
    }
}

/// Resolve `Effective` by merging CLI flags, discovered config, and defaults.
pub fn resolve_effective(cli: &Overrides) -> Result<Effective> {
    let start = match cli.root.as_deref() {
        Some(r) => PathBuf::from(r),
        None => std::env::current_dir().map_err(|e| Error::storage("read", ".", e))?,
    };
    let (base, loaded) = match cli.config.as_deref() {
        Some(path) => {
            let p = PathBuf::from(path);
            let cfg = load_file(&p)?;
            let dir = p
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            (dir, Some((p, cfg)))
        }
        None => {
            let root = detect_root(&start);
            let loaded = load_config(&root)?;
            (root, loaded)
        }
    };
    let (config_file, cfg) = match loaded {
        Some((p, c)) => (Some(p), c),
        None => (None, FileConfig::default()),
    };

    // `root` in the file is relative to the file; with --config, --root wins
    let root = match (cli.config.is_some(), cli.root.as_ref(), cfg.root.as_ref()) {
        (true, Some(r), _) => PathBuf::from(r),
        (_, _, Some(r)) => base.join(r),
        _ => base,
    };

    let pick = |cli_list: &Vec<String>, file: Option<Vec<String>>, default: Vec<String>| {
        if !cli_list.is_empty() {
            cli_list.clone()
        } else {
            file.unwrap_or(default)
        }
    };
    // CLI globs add to the configured ones
    let extend = |cli_list: &Vec<String>, file: Option<Vec<String>>, default: Vec<String>| {
        let mut out = file.unwrap_or(default);
        for g in cli_list {
            if !out.contains(g) {
                out.push(g.clone());
            }
        }
        out
    };
    let include = extend(&cli.include, cfg.include, vec!["**/*.md".to_string()]);
    let exclude = extend(&cli.exclude, cfg.exclude, Vec::new());
    let checkers = pick(
        &cli.checkers,
        cfg.checkers.enabled,
        vec!["image".to_string()],
    );
    let known: Vec<&str> = checks::available().into_iter().map(|(n, _)| n).collect();
    for name in &checkers {
        check_choice("checker", name, &known)?;
    }
    let image = cfg.checkers.image.unwrap_or_default();
    let link = cfg.checkers.link.unwrap_or_default();
    for (name, o) in [("image", &image), ("link", &link)] {
        if !(0.0..=1.0).contains(&o.fuzzy_threshold) {
            return Err(Error::Config(format!(
                "checkers.{}.fuzzy_threshold must be within [0, 1], got {}",
                name, o.fuzzy_threshold
            )));
        }
    }

    let resolver_kind = cfg
        .resolver
        .kind
        .unwrap_or_else(|| "default".to_string());
    if resolve::by_name(&resolver_kind, Vec::new(), true).is_none() {
        let names: Vec<&str> = resolve::available().into_iter().map(|(n, _)| n).collect();
        check_choice("resolver.kind", &resolver_kind, &names)?;
    }

    let output = cli
        .output
        .clone()
        .or(cfg.output.format)
        .unwrap_or_else(|| "human".to_string());
    check_choice("output", &output, &["human", "json"])?;
    let color = cfg.output.color.unwrap_or_else(|| "auto".to_string());
    check_choice("output.color", &color, &["auto", "always", "never"])?;

    let patch_dir = root.join(
        cfg.fix
            .patch_dir
            .unwrap_or_else(|| ".refcheck/patches".to_string()),
    );
    let dry_run = cli.dry_run.or(cfg.fix.dry_run).unwrap_or(false);

    Ok(Effective {
        config_file,
        include,
        exclude,
        checkers,
        image,
        link,
        resolver_kind,
        post_dirs: cfg
            .resolver
            .post_dirs
            .unwrap_or_else(|| vec!["_posts".to_string()]),
        asset_folder_per_post: cfg.resolver.asset_folder_per_post.unwrap_or(true),
        render: RenderOptions {
            output,
            color,
            context_lines: cfg.output.context_lines.unwrap_or(3),
            show_suggestions: cfg.output.show_suggestions.unwrap_or(true),
            quiet: cli.quiet,
        },
        patch_dir,
        dry_run,
        hooks: cfg.hooks,
        root,
    })
}

impl Effective {
    /// Build the collector input: checkers in configured order, one resolver
    /// and shell hooks.
    pub fn scan_config(&self) -> Result<ScanConfig> {
        let mut checkers = Vec::new();
        for name in &self.checkers {
            let opts = match name.as_str() {
                "link" => self.link.clone(),
                _ => self.image.clone(),
            };
            let checker = checks::by_name(name, opts)
                .ok_or_else(|| Error::Config(format!("unknown checker '{}'", name)))?;
            checkers.push(checker);
        }
        let resolver = resolve::by_name(
            &self.resolver_kind,
            self.post_dirs.clone(),
            self.asset_folder_per_post,
        )
        .ok_or_else(|| Error::Config(format!("unknown resolver '{}'", self.resolver_kind)))?;
        Ok(ScanConfig {
            root: self.root.clone(),
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            checkers,
            resolver: Arc::from(resolver),
            hooks: Box::new(ShellHooks {
                before_check: self.hooks.before_check.clone(),
                after_check: self.hooks.after_check.clone(),
            }),
        })
    }

    pub fn patch_engine(&self) -> PatchEngine {
        PatchEngine::new(self.root.clone(), PatchStore::new(self.patch_dir.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn at(root: &Path) -> Overrides {
        Overrides {
            root: root.to_str().map(String::from),
            ..Overrides::default()
        }
    }

    #[test]
    fn test_defaults_without_config() {
        let dir = tempdir().unwrap();
        let eff = resolve_effective(&at(dir.path())).unwrap();
        assert!(eff.config_file.is_none());
        assert_eq!(eff.include, vec!["**/*.md"]);
        assert_eq!(eff.checkers, vec!["image"]);
        assert_eq!(eff.resolver_kind, "default");
        assert_eq!(eff.render.output, "human");
        assert_eq!(eff.render.context_lines, 3);
        assert_eq!(eff.patch_dir, dir.path().join(".refcheck/patches"));
        assert!(eff.image.ignore_external);
        assert_eq!(eff.image.fuzzy_threshold, 0.6);
    }

    #[test]
    fn test_detect_and_load_toml() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let mut f = fs::File::create(root.join("refcheck.toml")).unwrap();
        writeln!(
            f,
            "{}",
            r#"
include = ["docs/**/*.md"]
exclude = ["docs/drafts/**"]
[checkers]
enabled = ["image", "link"]
[checkers.image]
fuzzy_threshold = 0.8
check_video = false
[resolver]
kind = "post-assets"
post_dirs = ["source/_posts"]
[output]
format = "json"
[fix]
patch_dir = "tmp/patches"
[hooks]
after_check = ["echo done"]
    "#
        )
        .unwrap();
        fs::create_dir_all(root.join("docs/sub")).unwrap();

        let eff = resolve_effective(&at(&root.join("docs/sub"))).unwrap();
        assert_eq!(eff.config_file, Some(root.join("refcheck.toml")));
        assert_eq!(eff.include, vec!["docs/**/*.md"]);
        assert_eq!(eff.exclude, vec!["docs/drafts/**"]);
        assert_eq!(eff.checkers, vec!["image", "link"]);
        assert_eq!(eff.image.fuzzy_threshold, 0.8);
        assert!(!eff.image.check_video);
        assert!(eff.image.skip_code_blocks);
        assert_eq!(eff.resolver_kind, "post-assets");
        assert_eq!(eff.post_dirs, vec!["source/_posts"]);
        assert_eq!(eff.render.output, "json");
        assert_eq!(eff.hooks.after_check, vec!["echo done"]);

        let scan = eff.scan_config().unwrap();
        assert_eq!(scan.checkers.len(), 2);
        assert_eq!(scan.resolver.name(), "post-assets");
    }

    #[test]
    fn test_load_yaml_and_cli_precedence() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(
            root.join("refcheck.yaml"),
            r#"
include: ["a/*.md"]
checkers:
  enabled: [link]
output:
  format: json
  context_lines: 1
fix:
  dry_run: true
"#,
        )
        .unwrap();
        let cli = Overrides {
            include: vec!["b/*.md".into()],
            output: Some("human".into()),
            dry_run: Some(false),
            ..at(root)
        };
        let eff = resolve_effective(&cli).unwrap();
        assert_eq!(eff.include, vec!["a/*.md", "b/*.md"]);
        assert_eq!(eff.checkers, vec!["link"]);
        assert_eq!(eff.render.output, "human");
        assert_eq!(eff.render.context_lines, 1);
        assert!(!eff.dry_run);
    }

    #[test]
    fn test_cli_globs_extend_configured_lists() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(
            root.join("refcheck.toml"),
            "exclude = [\"drafts/**\"]\n",
        )
        .unwrap();
        let cli = Overrides {
            include: vec!["notes/*.markdown".into(), "**/*.md".into()],
            exclude: vec!["vendor/**".into(), "drafts/**".into()],
            ..at(root)
        };
        let eff = resolve_effective(&cli).unwrap();
        assert_eq!(eff.include, vec!["**/*.md", "notes/*.markdown"]);
        assert_eq!(eff.exclude, vec!["drafts/**", "vendor/**"]);
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("refcheck.toml"), "[resolver]\nkind = \"jekyll\"\n").unwrap();
        assert!(matches!(resolve_effective(&at(root)), Err(Error::Config(_))));

        fs::write(root.join("refcheck.toml"), "[checkers.image]\nfuzzy_threshold = 1.5\n").unwrap();
        assert!(matches!(resolve_effective(&at(root)), Err(Error::Config(_))));

        fs::write(root.join("refcheck.toml"), "include = [").unwrap();
        assert!(matches!(resolve_effective(&at(root)), Err(Error::Config(_))));

        fs::write(root.join("refcheck.toml"), "").unwrap();
        let cli = Overrides {
            checkers: vec!["spelling".into()],
            ..at(root)
        };
        assert!(matches!(resolve_effective(&cli), Err(Error::Config(_))));
    }

    #[test]
    fn test_explicit_config_path_sets_root() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("conf")).unwrap();
        fs::write(root.join("conf/custom.toml"), "root = \"..\"\n").unwrap();
        let cli = Overrides {
            config: root.join("conf/custom.toml").to_str().map(String::from),
            ..Overrides::default()
        };
        let eff = resolve_effective(&cli).unwrap();
        assert_eq!(eff.root, root.join("conf/.."));
        assert_eq!(eff.patch_dir, root.join("conf/../.refcheck/patches"));
    }
}
