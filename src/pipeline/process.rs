// src/pipeline/process.rs

//! Single-pass file processor: applies the active subset of processors to
//! one file's content and writes the outputs.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use futures::future::try_join_all;
use tracing::{debug, warn};

use crate::fs::FileSystem;
use crate::path_utils::{base_name, relative_str};
use crate::pipeline::manifest::ManifestEntry;
use crate::pipeline::processor::{
    Contents, OutputFile, Processor, ProcessorAction, TransformOutput,
};

/// Process one file against a positionally-aligned set of processors.
///
/// `active` must have one slot per configured processor; `None` slots are
/// processors that did not include this file and produce a `None` fragment,
/// keeping the result aligned with the original processor order. The file is
/// read once and the bytes are shared across all active processors.
///
/// Each returned fragment maps the input path (relative to `base_dir`) to the
/// output path(s) relative to that processor's own output directory.
pub(crate) async fn process_file(
    fs: &Arc<dyn FileSystem>,
    file: &Path,
    base_dir: &Path,
    active: &[Option<Arc<Processor>>],
) -> Result<Vec<Option<(String, ManifestEntry)>>> {
    let contents: Contents = Arc::new(
        fs.read(file)
            .await
            .with_context(|| format!("reading file {file:?}"))?,
    );

    let in_name = relative_str(base_dir, file)
        .ok_or_else(|| anyhow!("cannot relativize {file:?} against {base_dir:?}"))?;
    let copy_name = base_name(&in_name);
    let rel_parent = match in_name.rsplit_once('/') {
        Some((parent, _)) => parent.to_string(),
        None => String::new(),
    };

    debug!(file = %in_name, active = active.iter().filter(|p| p.is_some()).count(), "processing file");

    let fragments = active.iter().map(|slot| {
        let slot = slot.clone();
        let fs = Arc::clone(fs);
        let contents = Arc::clone(&contents);
        let in_name = in_name.clone();
        let copy_name = copy_name.clone();
        let rel_parent = rel_parent.clone();
        async move {
            let Some(processor) = slot else {
                return Ok(None);
            };
            apply_one(&fs, &processor, contents, in_name, copy_name, rel_parent).await
        }
    });

    try_join_all(fragments).await
}

/// Run one processor over the shared contents and write its outputs.
async fn apply_one(
    fs: &Arc<dyn FileSystem>,
    processor: &Processor,
    contents: Contents,
    in_name: String,
    copy_name: String,
    rel_parent: String,
) -> Result<Option<(String, ManifestEntry)>> {
    let (outputs, is_list) = match &processor.action {
        ProcessorAction::Rename { rename } => {
            let name = match rename {
                Some(hook) => hook(in_name.clone(), Arc::clone(&contents))
                    .await?
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| copy_name.clone()),
                None => copy_name.clone(),
            };
            let output = OutputFile {
                content: (*contents).clone(),
                name,
            };
            (vec![output], false)
        }
        ProcessorAction::Transform { transform, rename } => {
            if rename.is_some() {
                warn!(
                    file = %in_name,
                    "rename hook on a transform processor is ignored; \
                     return names via TransformOutput::Single or Many instead"
                );
            }
            match transform(Arc::clone(&contents), in_name.clone()).await? {
                TransformOutput::Drop => return Ok(None),
                TransformOutput::Copy(content) => {
                    let output = OutputFile {
                        content,
                        name: copy_name.clone(),
                    };
                    (vec![output], false)
                }
                TransformOutput::Single(output) => (vec![output], false),
                TransformOutput::Many(outputs) => {
                    if outputs.is_empty() {
                        return Ok(None);
                    }
                    (outputs, true)
                }
            }
        }
    };

    let target_dir = if rel_parent.is_empty() {
        processor.out_dir.clone()
    } else {
        processor.out_dir.join(&rel_parent)
    };

    let writes = outputs.into_iter().map(|output| {
        let fs = Arc::clone(fs);
        let target = target_dir.join(&output.name);
        let out_dir = processor.out_dir.clone();
        async move {
            if let Some(parent) = target.parent() {
                fs.create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating dir {parent:?}"))?;
            }
            fs.write(&target, &output.content)
                .await
                .with_context(|| format!("writing file {target:?}"))?;
            relative_str(&out_dir, &target)
                .ok_or_else(|| anyhow!("cannot relativize {target:?} against {out_dir:?}"))
        }
    });

    let mut out_paths = try_join_all(writes).await?;

    let entry = if is_list {
        ManifestEntry::Many(out_paths)
    } else {
        match out_paths.pop() {
            Some(single) => ManifestEntry::Single(single),
            None => return Ok(None),
        }
    };

    Ok(Some((in_name, entry)))
}
