use crate::{
    config::{FailurePolicy, RunnerConfig, SubmitConfig},
    executors::Executors,
    jobs::{partition, EmitError, Job, JobEmitter, JobSummary},
};
use std::{
    fs,
    num::NonZeroUsize,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};
use tempfile::TempDir;

fn n(value: usize) -> NonZeroUsize {
    NonZeroUsize::new(value).unwrap()
}

/// tempdir with `{inputs}/2017/DY/files.list` holding `count` input files
fn setup(count: usize) -> (TempDir, RunnerConfig) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = RunnerConfig::default();
    config.paths.inputs = dir.path().join("input");
    config.paths.output = dir.path().join("output");
    config.paths.era_configs = PathBuf::from("../input/config");
    config.paths.environment = PathBuf::from("/opt/analysis/envset.sh");
    config.paths.install = PathBuf::from("/opt/analysis/install");

    let list_dir = config.sample_input_dir("2017", "DY").unwrap();
    fs::create_dir_all(&list_dir).unwrap();
    let content: String = (0..count)
        .map(|i| format!("/store/mc/DY/file_{i}.root\n"))
        .collect();
    fs::write(list_dir.join("files.list"), content).unwrap();

    (dir, config)
}

fn dry() -> Executors {
    Executors::load(&SubmitConfig {
        name: String::from("dry"),
        ..SubmitConfig::default()
    })
    .unwrap()
}

fn sub_dir(config: &RunnerConfig) -> PathBuf {
    config.sample_output_dir("2017", "DY").unwrap().join("Sub")
}

#[test]
pub fn partition_covers_input_in_order() {
    let items: Vec<usize> = (0..23).collect();

    for size in 1..30 {
        let groups: Vec<&[usize]> = partition(&items, n(size)).collect();

        assert_eq!(groups.len(), (items.len() + size - 1) / size);
        assert!(groups.iter().all(|group| !group.is_empty() && group.len() <= size));
        assert!(groups[..groups.len() - 1]
            .iter()
            .all(|group| group.len() == size));
        assert_eq!(groups.concat(), items);
    }
}

#[test]
pub fn partition_of_nothing_is_empty() {
    let items: Vec<String> = Vec::new();

    assert_eq!(partition(&items, n(50)).count(), 0);
}

#[test]
pub fn script_has_single_invocation() {
    let config = RunnerConfig::default();
    let files = vec![String::from("/store/a.root")];
    let job = Job {
        era: "2018",
        sample: "TTTo2L2Nu",
        index: 4,
        files: &files,
    };

    assert_eq!(
        job.render_script(&config),
        "#!/bin/bash\nsource ./envset.sh\ncd ./install\n./bin/Analyzer TTTo2L2Nu 2018 4\n"
    );
}

#[test]
pub fn descriptor_references_script_logs_and_config() {
    let files: Vec<String> = Vec::new();
    let job = Job {
        era: "2018",
        sample: "TT",
        index: 1,
        files: &files,
    };

    let descriptor = job.render_descriptor(
        Path::new("/out/2018/TT/Sub/TT_1.sh"),
        Path::new("/out/2018/TT/Log"),
        Path::new("../input/config/2018/config.json"),
    );

    assert_eq!(
        descriptor,
        "Universe = vanilla\n\
         Executable = /out/2018/TT/Sub/TT_1.sh\n\
         Output = /out/2018/TT/Log/TT_1.out\n\
         Error  = /out/2018/TT/Log/TT_1.err\n\
         Log    = /out/2018/TT/Log/TT_1.log\n\
         should_transfer_files = YES\n\
         when_to_transfer_output = ON_EXIT\n\
         transfer_input_files = ../input/config/2018/config.json\n\
         queue 1\n"
    );
}

#[test]
pub fn jobs_are_emitted_per_chunk() {
    let (_dir, config) = setup(125);
    let list_dir = config.sample_input_dir("2017", "DY").unwrap();
    let mut emitter = JobEmitter::new(&config, dry()).unwrap();

    let summary = emitter.create_jobs("2017", "DY", &list_dir, n(50)).unwrap();

    assert_eq!(
        summary,
        JobSummary {
            input_files: 125,
            written: 3,
            submitted: 3,
            failed: 0
        }
    );

    let sub = sub_dir(&config);
    for (index, size) in [(0, 50), (1, 50), (2, 25)] {
        let list = fs::read_to_string(sub.join(format!("DY_{index}.list"))).unwrap();
        assert_eq!(list.lines().count(), size);
        assert!(list.starts_with(&format!("/store/mc/DY/file_{}.root\n", index * 50)));

        let script_path = sub.join(format!("DY_{index}.sh"));
        let mode = fs::metadata(&script_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);

        let script = fs::read_to_string(&script_path).unwrap();
        let invocations: Vec<&str> = script
            .lines()
            .filter(|line| line.contains("Analyzer"))
            .collect();
        assert_eq!(invocations, vec![format!("./bin/Analyzer DY 2017 {index}")]);

        let descriptor = fs::read_to_string(sub.join(format!("DY_{index}.sub"))).unwrap();
        let executable = script_path.canonicalize().unwrap();
        assert!(descriptor.contains(&format!("Executable = {}\n", executable.display())));
        assert!(descriptor.ends_with("queue 1\n"));
    }

    assert!(!sub.join("DY_3.list").exists());
    assert!(config.sample_output_dir("2017", "DY").unwrap().join("Log").is_dir());

    match emitter.executor() {
        Executors::Dry(executor) => assert_eq!(executor.submitted().len(), 3),
        other => panic!("unexpected executor: {other:?}"),
    }
}

#[test]
pub fn re_running_is_idempotent() {
    let (_dir, config) = setup(7);
    let list_dir = config.sample_input_dir("2017", "DY").unwrap();
    let sub = sub_dir(&config);

    let read_all = || {
        let mut entries: Vec<(PathBuf, String)> = fs::read_dir(&sub)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .map(|path| {
                let content = fs::read_to_string(&path).unwrap();
                (path, content)
            })
            .collect();
        entries.sort();
        entries
    };

    JobEmitter::new(&config, dry())
        .unwrap()
        .create_jobs("2017", "DY", &list_dir, n(3))
        .unwrap();
    let first = read_all();

    JobEmitter::new(&config, dry())
        .unwrap()
        .create_jobs("2017", "DY", &list_dir, n(3))
        .unwrap();

    assert_eq!(first.len(), 9);
    assert_eq!(first, read_all());
}

#[test]
pub fn sample_without_inputs_emits_nothing() {
    let (_dir, config) = setup(0);
    let list_dir = config.sample_input_dir("2017", "DY").unwrap();

    let summary = JobEmitter::new(&config, dry())
        .unwrap()
        .create_jobs("2017", "DY", &list_dir, n(50))
        .unwrap();

    assert_eq!(summary, JobSummary::default());
    assert_eq!(fs::read_dir(sub_dir(&config)).unwrap().count(), 0);
}

#[test]
pub fn missing_input_directory_is_an_error() {
    let (dir, config) = setup(1);

    let result = JobEmitter::new(&config, dry())
        .unwrap()
        .create_jobs("2017", "DY", &dir.path().join("missing"), n(50));

    assert!(matches!(result, Err(EmitError::Collect(_))));
}

fn failing(on_failure: FailurePolicy) -> SubmitConfig {
    SubmitConfig {
        command: String::from("sh"),
        args: vec![String::from("-c"), String::from("exit 1")],
        on_failure,
        ..SubmitConfig::default()
    }
}

#[test]
pub fn failed_submit_halts() {
    let (_dir, mut config) = setup(10);
    config.submit = failing(FailurePolicy::Halt);
    let list_dir = config.sample_input_dir("2017", "DY").unwrap();
    let executor = Executors::load(&config.submit).unwrap();

    let result = JobEmitter::new(&config, executor)
        .unwrap()
        .create_jobs("2017", "DY", &list_dir, n(5));

    assert!(matches!(result, Err(EmitError::Submit { job, .. }) if job == "DY_0"));
    // artifacts of the failed job are kept, later jobs are never written
    assert!(sub_dir(&config).join("DY_0.sub").is_file());
    assert!(!sub_dir(&config).join("DY_1.sub").exists());
}

#[test]
pub fn failed_submit_continues() {
    let (_dir, mut config) = setup(10);
    config.submit = failing(FailurePolicy::Continue);
    let list_dir = config.sample_input_dir("2017", "DY").unwrap();
    let executor = Executors::load(&config.submit).unwrap();

    let summary = JobEmitter::new(&config, executor)
        .unwrap()
        .create_jobs("2017", "DY", &list_dir, n(5))
        .unwrap();

    assert_eq!(
        summary,
        JobSummary {
            input_files: 10,
            written: 2,
            submitted: 0,
            failed: 2
        }
    );
}

#[test]
pub fn sample_names_cannot_escape_the_output_directory() {
    let (dir, config) = setup(3);
    let escape = dir.path().join("escape");
    let list_dir = config.sample_input_dir("2017", "DY").unwrap();

    let result = JobEmitter::new(&config, dry()).unwrap().create_jobs(
        "2017",
        &escape.to_string_lossy(),
        &list_dir,
        n(50),
    );

    assert!(matches!(result, Err(EmitError::InvalidName(_))));
    assert!(!escape.exists());
}
