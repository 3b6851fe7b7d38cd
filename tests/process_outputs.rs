mod common;
use crate::common::builders::transform_with;
use crate::common::init_tracing;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use filemill::fs::mock::MockFileSystem;
use filemill::hash::content_hash_namer;
use filemill::pipeline::{
    Manifest, ManifestEntry, OutputFile, Pipeline, Processor, TransformOutput,
};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn hash_namer_suffixes_stem_with_uppercase_sha256_prefix() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("src/a.txt", "hello world");

    let pipeline = Pipeline::with_fs(
        vec![Processor::rename("dist", content_hash_namer(8))],
        Arc::new(fs.clone()),
    );
    let manifest = pipeline.compile("src").await?;

    // First 8 hex chars of sha256("hello world"), uppercased.
    assert_eq!(
        manifest.get(0, "a.txt"),
        Some(&ManifestEntry::Single("a-B94D27B9.txt".to_string()))
    );
    assert!(fs.written().contains(&PathBuf::from("dist/a-B94D27B9.txt")));
    Ok(())
}

#[tokio::test]
async fn transform_drop_removes_file_and_writes_nothing() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("src/a.txt", "alpha");
    fs.add_file("src/b.txt", "beta");

    let transform = transform_with(|contents, _name| {
        if contents == b"alpha".as_slice() {
            TransformOutput::Drop
        } else {
            TransformOutput::Copy(contents.to_vec())
        }
    });
    let pipeline = Pipeline::with_fs(
        vec![Processor::transform("dist", transform)],
        Arc::new(fs.clone()),
    );
    let manifest = pipeline.compile("src").await?;

    assert!(manifest.get(0, "a.txt").is_none());
    assert!(manifest.get(0, "b.txt").is_some());
    assert_eq!(fs.written(), vec![PathBuf::from("dist/b.txt")]);
    Ok(())
}

#[tokio::test]
async fn transform_list_keeps_output_order() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("src/page.md", "# title");

    let transform = transform_with(|contents, name| {
        let stem = name.trim_end_matches(".md");
        TransformOutput::Many(vec![
            OutputFile {
                content: contents.to_vec(),
                name: format!("{stem}.html"),
            },
            OutputFile {
                content: b"{}".to_vec(),
                name: format!("{stem}.meta.json"),
            },
        ])
    });
    let pipeline = Pipeline::with_fs(
        vec![Processor::transform("dist", transform)],
        Arc::new(fs.clone()),
    );
    let manifest = pipeline.compile("src").await?;

    assert_eq!(
        manifest.get(0, "page.md"),
        Some(&ManifestEntry::Many(vec![
            "page.html".to_string(),
            "page.meta.json".to_string(),
        ]))
    );
    Ok(())
}

#[tokio::test]
async fn one_element_transform_list_stays_a_list() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("src/a.txt", "alpha");

    let transform = transform_with(|contents, _name| {
        TransformOutput::Many(vec![OutputFile {
            content: contents.to_vec(),
            name: "only.txt".to_string(),
        }])
    });
    let pipeline =
        Pipeline::with_fs(vec![Processor::transform("dist", transform)], Arc::new(fs));
    let manifest = pipeline.compile("src").await?;

    assert_eq!(
        manifest.get(0, "a.txt"),
        Some(&ManifestEntry::Many(vec!["only.txt".to_string()]))
    );
    Ok(())
}

#[tokio::test]
async fn empty_transform_list_behaves_like_drop() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("src/a.txt", "alpha");

    let transform = transform_with(|_contents, _name| TransformOutput::Many(Vec::new()));
    let pipeline = Pipeline::with_fs(
        vec![Processor::transform("dist", transform)],
        Arc::new(fs.clone()),
    );
    let manifest = pipeline.compile("src").await?;

    assert!(manifest.get(0, "a.txt").is_none());
    assert!(fs.written().is_empty());
    Ok(())
}

#[tokio::test]
async fn rename_hook_on_transform_unit_is_ignored() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("src/a.txt", "alpha");

    // The misconfigured rename hook must never decide the output name; the
    // transform result wins.
    let transform = transform_with(|contents, _name| {
        TransformOutput::Single(OutputFile {
            content: contents.to_vec(),
            name: "from-transform.txt".to_string(),
        })
    });
    let processor =
        Processor::transform("dist", transform).with_rename(content_hash_namer(8));
    let pipeline = Pipeline::with_fs(vec![processor], Arc::new(fs.clone()));
    let manifest = pipeline.compile("src").await?;

    assert_eq!(
        manifest.get(0, "a.txt"),
        Some(&ManifestEntry::Single("from-transform.txt".to_string()))
    );
    assert_eq!(fs.written(), vec![PathBuf::from("dist/from-transform.txt")]);
    Ok(())
}

#[tokio::test]
async fn nested_outputs_land_under_mirrored_directories() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("src/sub/a.txt", "hello world");

    let pipeline = Pipeline::with_fs(
        vec![Processor::rename("dist", content_hash_namer(8))],
        Arc::new(fs.clone()),
    );
    let manifest = pipeline.compile("src").await?;

    assert_eq!(
        manifest.get(0, "sub/a.txt"),
        Some(&ManifestEntry::Single("sub/a-B94D27B9.txt".to_string()))
    );
    assert!(
        fs.written()
            .contains(&PathBuf::from("dist/sub/a-B94D27B9.txt"))
    );
    Ok(())
}

#[tokio::test]
async fn manifest_flattens_only_for_a_single_processor() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file("src/a.txt", "alpha");

    let single = Pipeline::with_fs(vec![Processor::copy("one")], Arc::new(fs.clone()));
    assert!(matches!(single.compile("src").await?, Manifest::Single(_)));

    let double = Pipeline::with_fs(
        vec![Processor::copy("one"), Processor::copy("two")],
        Arc::new(fs),
    );
    match double.compile("src").await? {
        Manifest::Many(maps) => assert_eq!(maps.len(), 2),
        Manifest::Single(_) => panic!("two processors must not flatten"),
    }
    Ok(())
}
