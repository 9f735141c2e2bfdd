use std::collections::BTreeSet;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use xfuse_core::{
    ArchiveStatus, BlockOrder, FuseConfig, LayoutStyle, RunConfig, RunStatus, SkipReason, run,
    run_with_writer,
};

struct Fixture {
    source: TempDir,
    out: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            source: TempDir::new().unwrap(),
            out: TempDir::new().unwrap(),
        }
    }

    fn root(&self) -> PathBuf {
        self.source.path().canonicalize().unwrap()
    }

    fn file(&self, rel: &str, contents: impl AsRef<[u8]>) -> &Self {
        let path = self.source.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
        self
    }

    fn output(&self) -> PathBuf {
        self.out.path().join("combined.txt")
    }

    fn config(&self, edit: impl FnOnce(&mut FuseConfig)) -> RunConfig {
        let mut config = FuseConfig::for_source(self.source.path());
        config.general.output_file = self.output();
        edit(&mut config);
        config.resolve().unwrap()
    }

    fn read_output(&self) -> String {
        fs::read_to_string(self.output()).unwrap()
    }
}

fn basic_tree() -> Fixture {
    let fx = Fixture::new();
    fx.file("a.py", "a".repeat(100))
        .file("b.txt", "b".repeat(50))
        .file(".git/c.py", "c".repeat(10));
    fx
}

fn python_only(c: &mut FuseConfig) {
    c.filters.extensions = vec![".py".into()];
}

#[test]
fn extension_filter_and_excluded_folder() {
    let fx = basic_tree();
    let summary = run(&fx.config(python_only)).unwrap();
    let root = fx.root();

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.files_processed, 1);
    assert_eq!(summary.total_bytes, 100);
    assert_eq!(summary.processed_files, vec![root.join("a.py")]);
    assert_eq!(summary.skip_reason(&root.join("b.txt")), Some(SkipReason::Extension));
    assert_eq!(
        summary.skip_reason(&root.join(".git").join("c.py")),
        Some(SkipReason::ExcludedFolder)
    );
    assert_eq!(summary.skipped_folders.len(), 1);
    assert_eq!(summary.skipped_folders[0].path, root.join(".git"));

    let out = fx.read_output();
    assert!(out.contains("## File: a.py\n"));
    assert!(!out.contains("## File: b.txt"));
    assert!(!out.contains("## File: .git"));
    assert!(out.contains("Files Processed: 1\n"));
}

#[test]
fn size_limit_excludes_everything_over_it() {
    let fx = basic_tree();
    let summary = run(&fx.config(|c| {
        python_only(c);
        c.filters.max_file_size_mb = Some(0.00001);
    }))
    .unwrap();
    assert_eq!(summary.status, RunStatus::NothingToDo);
    assert_eq!(summary.files_processed, 0);
    assert_eq!(summary.skip_reason(&fx.root().join("a.py")), Some(SkipReason::TooLarge));
    assert!(fx.read_output().contains("Files Processed: 0\n"));
}

#[test]
fn worker_count_does_not_change_the_result() {
    let fx = Fixture::new();
    for i in 0..40 {
        fx.file(&format!("pkg{}/mod{}.rs", i % 5, i), format!("// module {}\n", i).repeat(i + 1));
    }

    let single = run(&fx.config(|c| c.general.workers = 1)).unwrap();
    let single_out = fx.read_output();
    let many = run(&fx.config(|c| c.general.workers = 8)).unwrap();
    let many_out = fx.read_output();

    assert_eq!(single.files_processed, 40);
    assert_eq!(single.processed_files, many.processed_files);
    assert_eq!(single.total_bytes, many.total_bytes);
    assert_eq!(single_out.len(), many_out.len());

    let headers = |text: &str| -> BTreeSet<String> {
        text.lines()
            .filter_map(|l| l.strip_prefix("## File: "))
            .map(str::to_string)
            .collect()
    };
    assert_eq!(headers(&single_out), headers(&many_out));
    assert_eq!(headers(&many_out).len(), 40);
}

#[test]
fn every_block_is_contiguous_under_concurrency() {
    let fx = Fixture::new();
    for i in 0..30 {
        fx.file(&format!("f{:02}.txt", i), format!("f{:02}\n", i).repeat(200));
    }
    run(&fx.config(|c| {
        c.general.workers = 6;
        c.output.write_summary = false;
    }))
    .unwrap();

    let out = fx.read_output();
    let mut current = None;
    for line in out.lines() {
        if let Some(rel) = line.strip_prefix("## File: ") {
            current = Some(rel.trim_end_matches(".txt").to_string());
        } else if !line.is_empty() && current.is_some() {
            assert_eq!(Some(line), current.as_deref());
        }
    }
}

#[test]
fn traversal_order_is_reproducible() {
    let fx = Fixture::new();
    for name in ["zeta.rs", "alpha.rs", "mid/beta.rs", "mid/gamma.rs", "omega.rs"] {
        fx.file(name, name);
    }
    let config = fx.config(|c| {
        c.general.workers = 4;
        c.general.block_order = BlockOrder::Traversal;
        c.output.write_summary = false;
    });

    let (_, first) = run_with_writer(&config, Vec::new()).unwrap();
    let (_, second) = run_with_writer(&config, Vec::new()).unwrap();
    let first = String::from_utf8(first).unwrap();
    let second = String::from_utf8(second).unwrap();

    let body = |text: &str| text.split_once("\n\n").unwrap().1.to_string();
    assert_eq!(body(&first), body(&second));
    let order: Vec<&str> = first
        .lines()
        .filter_map(|l| l.strip_prefix("## File: "))
        .collect();
    let sep = std::path::MAIN_SEPARATOR;
    assert_eq!(
        order,
        vec![
            "alpha.rs".to_string(),
            format!("mid{sep}beta.rs"),
            format!("mid{sep}gamma.rs"),
            "omega.rs".to_string(),
            "zeta.rs".to_string(),
        ]
    );
}

#[test]
fn repeated_runs_agree_except_for_the_timestamp() {
    let fx = basic_tree();
    let config = fx.config(|c| c.general.block_order = BlockOrder::Traversal);
    let first = run(&config).unwrap();
    let first_out = fx.read_output();
    let second = run(&config).unwrap();
    let second_out = fx.read_output();

    assert_eq!(first.processed_files, second.processed_files);
    assert_eq!(first.skipped_files, second.skipped_files);
    let strip = |s: &str| s.lines().skip(1).collect::<Vec<_>>().join("\n");
    assert_eq!(strip(&first_out), strip(&second_out));
}

#[test]
fn output_inside_source_is_not_ingested() {
    let fx = Fixture::new();
    fx.file("notes.txt", "notes\n");
    let output = fx.source.path().join("combined.txt");
    let mut config = FuseConfig::for_source(fx.source.path());
    config.general.output_file = output.clone();
    let config = config.resolve().unwrap();

    run(&config).unwrap();
    let summary = run(&config).unwrap();
    assert_eq!(summary.files_processed, 1);
    assert_eq!(
        summary.skip_reason(&output.canonicalize().unwrap()),
        Some(SkipReason::OutputArtifact)
    );
    let out = fs::read_to_string(&output).unwrap();
    assert!(!out.contains("## File: combined.txt"));
}

#[test]
fn previous_archive_inside_source_is_not_ingested() {
    let fx = Fixture::new();
    fx.file("notes.txt", "notes\n");
    let output = fx.source.path().join("combined.txt");
    let mut config = FuseConfig::for_source(fx.source.path());
    config.general.output_file = output.clone();
    config.general.archive = true;
    let config = config.resolve().unwrap();

    run(&config).unwrap();
    let summary = run(&config).unwrap();
    let zip_path = fx.root().join("combined.zip");
    assert_eq!(summary.files_processed, 1);
    assert_eq!(summary.skip_reason(&zip_path), Some(SkipReason::OutputArtifact));
    assert!(!fs::read_to_string(&output).unwrap().contains("## File: combined.zip"));
}

#[test]
fn archive_contains_the_artifact() {
    let fx = basic_tree();
    let summary = run(&fx.config(|c| {
        python_only(c);
        c.general.archive = true;
    }))
    .unwrap();

    let zip_path = fx.out.path().join("combined.zip");
    assert_eq!(
        summary.archive,
        Some(ArchiveStatus::Created {
            path: zip_path.clone()
        })
    );
    let mut archive = zip::ZipArchive::new(fs::File::open(&zip_path).unwrap()).unwrap();
    let mut entry = archive.by_name("combined.txt").unwrap();
    let mut text = String::new();
    entry.read_to_string(&mut text).unwrap();
    assert_eq!(text, fx.read_output());
}

#[test]
fn no_archive_when_nothing_to_do() {
    let fx = Fixture::new();
    fx.file("readme.md", "# hi\n");
    let summary = run(&fx.config(|c| {
        python_only(c);
        c.general.archive = true;
    }))
    .unwrap();
    assert_eq!(summary.status, RunStatus::NothingToDo);
    assert_eq!(summary.archive, None);
    assert!(!fx.out.path().join("combined.zip").exists());
}

#[test]
fn invalid_config_creates_no_output() {
    let fx = basic_tree();
    let mut config = FuseConfig::for_source(fx.source.path());
    config.general.output_file = fx.output();
    config.filters.exclude_patterns = vec!["(".into()];
    assert!(config.resolve().unwrap_err().is_config_error());
    assert!(!fx.output().exists());

    let mut config = FuseConfig::for_source(fx.source.path().join("missing"));
    config.general.output_file = fx.output();
    assert!(config.resolve().is_err());
    assert!(!fx.output().exists());
}

#[test]
fn skip_lists_can_collapse_to_counts() {
    let fx = basic_tree();
    run(&fx.config(|c| {
        python_only(c);
        c.output.detail_skipped_files = false;
    }))
    .unwrap();
    let out = fx.read_output();
    assert!(out.contains("\nSkipped Folders:\n- .git\n"));
    assert!(out.contains("Skipped Files Count: 2\n"));
    assert!(!out.contains("- b.txt"));
}

#[test]
fn no_summary_when_disabled() {
    let fx = basic_tree();
    run(&fx.config(|c| {
        python_only(c);
        c.output.write_summary = false;
    }))
    .unwrap();
    let out = fx.read_output();
    assert!(!out.contains("Files Processed"));
    assert!(out.contains("## File: a.py"));
}

#[test]
fn transforms_apply_to_block_bodies() {
    let fx = Fixture::new();
    fx.file("lib.rs", "/* licence\n text */\nfn main() {}\n");
    run(&fx.config(|c| {
        c.output.strip_block_comments = true;
        c.output.line_numbers = true;
        c.output.syntax_fence = true;
        c.output.write_summary = false;
    }))
    .unwrap();
    let out = fx.read_output();
    assert!(out.ends_with("## File: lib.rs\n```rs\n   1 | \n   2 | fn main() {}\n```\n\n"));
}

#[test]
fn banner_layout_frames_each_file() {
    let fx = Fixture::new();
    fx.file("a.txt", "hello\n");
    run(&fx.config(|c| {
        c.general.style = LayoutStyle::Banner;
        c.output.file_size = true;
    }))
    .unwrap();
    let out = fx.read_output();
    let rule = "=".repeat(80);
    assert!(out.starts_with("=== xfuse Run Summary ===\n"));
    assert!(out.contains(&format!("{rule}\nFile: a.txt\nSize: 0.01 KB\n{rule}\n\nhello\n")));
}

#[cfg(unix)]
#[test]
fn unreadable_file_leaves_a_stub_and_the_run_continues() {
    use std::os::unix::fs::PermissionsExt;
    let fx = Fixture::new();
    fx.file("ok.txt", "fine\n").file("locked.txt", "secret\n");
    let locked = fx.source.path().join("locked.txt");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::read(&locked).is_ok() {
        // Running with privileges that ignore permission bits.
        return;
    }

    let summary = run(&fx.config(|_| {})).unwrap();
    assert_eq!(summary.files_processed, 1);
    assert_eq!(summary.failed_files.len(), 1);
    let out = fx.read_output();
    assert!(out.contains("Error reading locked.txt: "));
    assert!(out.contains("Files With Errors: 1\n"));
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
}

#[cfg(unix)]
#[test]
fn fifo_in_source_is_skipped_and_the_run_completes() {
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    let fx = Fixture::new();
    fx.file("a.txt", "a\n");
    let fifo = fx.source.path().join("pipe.txt");
    let made = std::process::Command::new("mkfifo").arg(&fifo).status();
    if !made.is_ok_and(|s| s.success()) {
        return;
    }
    let config = fx.config(|_| {});

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(run_with_writer(&config, Vec::new()));
    });
    let (summary, out) = rx
        .recv_timeout(Duration::from_secs(10))
        .expect("run finished")
        .unwrap();
    assert_eq!(summary.files_processed, 1);
    assert_eq!(summary.skip_reason(&fx.root().join("pipe.txt")), Some(SkipReason::NotRegular));
    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("- pipe.txt (not a regular file)"));
}

#[cfg(unix)]
#[test]
fn unlistable_directory_is_a_skipped_folder() {
    use std::os::unix::fs::PermissionsExt;
    let fx = Fixture::new();
    fx.file("ok.rs", "fn ok() {}\n").file("locked/inner.rs", "fn hidden() {}\n");
    let locked = fx.source.path().join("locked");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::read_dir(&locked).is_ok() {
        // Running with privileges that ignore permission bits.
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let result = run(&fx.config(|c| c.filters.extensions = vec![".rs".into()]));
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
    let summary = result.unwrap();
    assert_eq!(summary.files_processed, 1);
    assert_eq!(summary.skipped_folders.len(), 1);
    assert_eq!(summary.skipped_folders[0].path, fx.root().join("locked"));
    assert_eq!(summary.skipped_folders[0].reason, SkipReason::MetadataUnavailable);
    assert_eq!(summary.skip_reason(&fx.root().join("locked")), None);
}

#[cfg(unix)]
#[test]
fn symlinks_are_recorded_not_followed() {
    let fx = Fixture::new();
    fx.file("real/a.txt", "a\n");
    std::os::unix::fs::symlink(fx.source.path().join("real"), fx.source.path().join("alias"))
        .unwrap();
    let summary = run(&fx.config(|_| {})).unwrap();
    assert_eq!(summary.files_processed, 1);
    assert_eq!(summary.skip_reason(&fx.root().join("alias")), Some(SkipReason::Symlink));
}

#[test]
fn missing_output_parent_is_created() {
    let fx = basic_tree();
    let nested: &Path = &fx.out.path().join("deep").join("er");
    let mut config = FuseConfig::for_source(fx.source.path());
    config.general.output_file = nested.join("out.txt");
    let summary = run(&config.resolve().unwrap()).unwrap();
    assert!(nested.join("out.txt").is_file());
    assert_eq!(summary.output, Some(nested.join("out.txt")));
}
