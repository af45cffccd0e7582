//! lopdf-backed engine for the PDF-native actions.
//!
//! Handles `compress`, `split`, `merge`, `rotate` and `add_numbers` in
//! process. Rendering and format conversion need external tooling and are
//! left to [`crate::external::CommandEngine`].

use crate::engine::{ProcessOutput, ProcessRequest, ProcessingEngine};
use crate::error::ProcessingError;
use crate::pages::{rotation_selection, split_groups};
use docrelay_protocol::{Action, OptionSet, Position};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Resource name of the font used for page numbers.
const NUMBER_FONT: &[u8] = b"DrNum";
const NUMBER_FONT_SIZE: f32 = 9.0;
/// Half an inch.
const NUMBER_MARGIN: f32 = 36.0;
/// US Letter, used when a page has no usable MediaBox.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];
const MAX_TREE_DEPTH: usize = 64;
/// Page attributes a page may inherit from its ancestors.
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// In-process engine built on lopdf.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfEngine;

impl LopdfEngine {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessingEngine for LopdfEngine {
    fn name(&self) -> &str {
        "lopdf"
    }

    fn supports(&self, action: Action) -> bool {
        matches!(
            action,
            Action::Compress | Action::Split | Action::Merge | Action::Rotate | Action::AddNumbers
        )
    }

    fn process(&self, request: &ProcessRequest) -> Result<ProcessOutput, ProcessingError> {
        let output = request.output.clone();
        match (request.action, &request.options) {
            (Action::Compress, OptionSet::Empty) => {
                compress(request.primary_input()?, &output)?;
                Ok(ProcessOutput::File(output))
            }
            (Action::Split, OptionSet::Ranges { ranges }) => {
                let parts = split(
                    request.primary_input()?,
                    ranges,
                    &request.work_dir,
                    &request.base_name,
                )?;
                Ok(ProcessOutput::Files(parts))
            }
            (Action::Merge, OptionSet::Empty) => {
                merge(&request.inputs, &output)?;
                Ok(ProcessOutput::File(output))
            }
            (Action::Rotate, OptionSet::Rotate { pages, angle }) => {
                rotate(request.primary_input()?, &output, pages, *angle)?;
                Ok(ProcessOutput::File(output))
            }
            (Action::AddNumbers, OptionSet::Position { position }) => {
                add_page_numbers(request.primary_input()?, &output, *position)?;
                Ok(ProcessOutput::File(output))
            }
            (action, _) if self.supports(action) => Err(ProcessingError::Failed(format!(
                "options do not match action '{}'",
                action
            ))),
            (action, _) => Err(ProcessingError::Unsupported { action }),
        }
    }
}

/// Removes unreferenced objects and compresses every stream.
pub fn compress(input: &Path, output: &Path) -> Result<(), ProcessingError> {
    let mut doc = load(input)?;
    let pruned = doc.prune_objects();
    doc.compress();
    save(&mut doc, output)?;
    info!(pruned = pruned.len(), "compressed document");
    Ok(())
}

/// Writes one part per valid range into `out_dir`, named
/// `split_{n}_{base_name}.pdf`.
pub fn split(
    input: &Path,
    ranges: &str,
    out_dir: &Path,
    base_name: &str,
) -> Result<Vec<PathBuf>, ProcessingError> {
    let doc = load(input)?;
    let page_count = doc.get_pages().len() as u32;
    let groups = split_groups(ranges, page_count);
    if groups.is_empty() {
        return Err(ProcessingError::NoValidRanges(ranges.to_string()));
    }

    let mut parts = Vec::with_capacity(groups.len());
    for range in groups {
        let mut part = doc.clone();
        // Highest first, so earlier page numbers stay valid.
        for page in (1..=page_count).rev() {
            if page < range.start || page > range.end {
                part.delete_pages(&[page]);
            }
        }
        part.prune_objects();
        part.compress();

        let path = out_dir.join(format!("split_{}_{}.pdf", parts.len() + 1, base_name));
        match save(&mut part, &path) {
            Ok(()) => {
                debug!(start = range.start, end = range.end, part = %path.display(), "split part written");
                parts.push(path);
            }
            Err(e) => warn!(start = range.start, end = range.end, error = %e, "skipping split part"),
        }
    }

    if parts.is_empty() {
        return Err(ProcessingError::Failed("no split parts could be written".into()));
    }
    info!(parts = parts.len(), "split document");
    Ok(parts)
}

/// Concatenates `inputs` in the order given. Unreadable inputs are skipped.
pub fn merge(inputs: &[PathBuf], output: &Path) -> Result<usize, ProcessingError> {
    let mut docs = Vec::with_capacity(inputs.len());
    for path in inputs {
        match load(path) {
            Ok(doc) => docs.push(doc),
            Err(e) => warn!(input = %path.display(), error = %e, "skipping unreadable merge input"),
        }
    }
    if docs.is_empty() {
        return Err(ProcessingError::NoInputs);
    }

    let merged_count = docs.len();
    let mut merged = merge_documents(docs)?;
    merged.prune_objects();
    merged.compress();
    save(&mut merged, output)?;
    info!(documents = merged_count, pages = merged.get_pages().len(), "merged documents");
    Ok(merged_count)
}

/// Adds `angle` to the rotation of every selected page.
pub fn rotate(input: &Path, output: &Path, pages: &str, angle: i32) -> Result<usize, ProcessingError> {
    let mut doc = load(input)?;
    let page_map = doc.get_pages();
    let selection = rotation_selection(pages, page_map.len() as u32)?;
    if selection.is_empty() {
        warn!(pages, "no pages selected for rotation");
    }

    let mut rotated = 0;
    for (number, page_id) in page_map {
        if !selection.contains(&number) {
            continue;
        }
        let current = inherited_attr(&doc, page_id, b"Rotate")
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(0);
        let rotation = (current + i64::from(angle)).rem_euclid(360);
        doc.get_object_mut(page_id)?
            .as_dict_mut()?
            .set("Rotate", Object::Integer(rotation));
        rotated += 1;
    }

    save(&mut doc, output)?;
    info!(rotated, angle, "rotated pages");
    Ok(rotated)
}

/// Stamps "Page i of n" on every page.
///
/// A page that cannot be stamped is left as it was.
pub fn add_page_numbers(input: &Path, output: &Path, position: Position) -> Result<usize, ProcessingError> {
    let mut doc = load(input)?;
    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
    let total = pages.len();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let save_state_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));

    let mut stamped = 0;
    for (index, page_id) in pages.into_iter().enumerate() {
        let label = format!("Page {} of {}", index + 1, total);
        match stamp_page(&mut doc, page_id, &label, position, font_id, save_state_id) {
            Ok(()) => stamped += 1,
            Err(e) => warn!(page = index + 1, error = %e, "could not number page"),
        }
    }

    save(&mut doc, output)?;
    info!(stamped, total, %position, "numbered pages");
    Ok(stamped)
}

fn stamp_page(
    doc: &mut Document,
    page_id: ObjectId,
    label: &str,
    position: Position,
    font_id: ObjectId,
    save_state_id: ObjectId,
) -> Result<(), ProcessingError> {
    let (x, y) = label_origin(
        media_box(doc, page_id),
        text_width(label, NUMBER_FONT_SIZE),
        position,
    );
    let overlay = Content {
        operations: vec![
            Operation::new("Q", vec![]),
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(NUMBER_FONT.to_vec()), Object::Real(NUMBER_FONT_SIZE)],
            ),
            Operation::new("Td", vec![Object::Real(x), Object::Real(y)]),
            Operation::new(
                "Tj",
                vec![Object::String(label.as_bytes().to_vec(), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
        ],
    };
    let overlay_id = doc.add_object(Stream::new(Dictionary::new(), overlay.encode()?));
    let resources = page_resources(doc, page_id, font_id)?;

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    let mut contents = vec![Object::Reference(save_state_id)];
    match page.get(b"Contents") {
        Ok(Object::Array(existing)) => contents.extend(existing.iter().cloned()),
        Ok(existing) => contents.push(existing.clone()),
        Err(_) => {}
    }
    contents.push(Object::Reference(overlay_id));
    page.set("Contents", Object::Array(contents));
    page.set("Resources", Object::Dictionary(resources));
    Ok(())
}

/// Lower-left corner of the page-number label.
pub fn label_origin(media_box: [f32; 4], text_width: f32, position: Position) -> (f32, f32) {
    let [x0, y0, x1, y1] = media_box;
    let (width, height) = (x1 - x0, y1 - y0);

    let x = match position {
        Position::BottomLeft | Position::TopLeft => NUMBER_MARGIN,
        Position::BottomRight | Position::TopRight => width - text_width - NUMBER_MARGIN,
        Position::BottomCenter | Position::TopCenter => (width - text_width) / 2.0,
    };
    let y = if position.is_top() {
        height - NUMBER_MARGIN - NUMBER_FONT_SIZE
    } else {
        NUMBER_MARGIN
    };
    (x0 + x, y0 + y)
}

/// Width of `text` in Helvetica at `size` points.
fn text_width(text: &str, size: f32) -> f32 {
    let units: u32 = text
        .chars()
        .map(|c| match c {
            ' ' | 'f' | 'i' | 'l' | 't' => 278,
            'P' => 667,
            _ => 556,
        })
        .sum();
    units as f32 * size / 1000.0
}

fn page_resources(doc: &Document, page_id: ObjectId, font_id: ObjectId) -> Result<Dictionary, ProcessingError> {
    let mut resources = match inherited_attr(doc, page_id, b"Resources") {
        Some(object) => resolve_dict(doc, &object)?,
        None => Dictionary::new(),
    };
    let mut fonts = match resources.get(b"Font") {
        Ok(object) => resolve_dict(doc, object)?,
        Err(_) => Dictionary::new(),
    };
    fonts.set(NUMBER_FONT.to_vec(), Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));
    Ok(resources)
}

fn resolve_dict(doc: &Document, object: &Object) -> Result<Dictionary, ProcessingError> {
    let dict = match object {
        Object::Reference(id) => doc.get_object(*id)?.as_dict()?,
        other => other.as_dict()?,
    };
    Ok(dict.clone())
}

fn media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    let object = match inherited_attr(doc, page_id, b"MediaBox") {
        Some(Object::Reference(id)) => doc.get_object(id).ok().cloned(),
        other => other,
    };
    object
        .as_ref()
        .and_then(|o| o.as_array().ok())
        .filter(|items| items.len() == 4)
        .and_then(|items| {
            let mut corners = [0.0f32; 4];
            for (slot, item) in corners.iter_mut().zip(items) {
                *slot = number(item)?;
            }
            Some(corners)
        })
        .unwrap_or(DEFAULT_MEDIA_BOX)
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Looks `key` up on the page, then on each ancestor in the page tree.
fn inherited_attr(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut node = doc.get_object(page_id).ok()?.as_dict().ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_object(parent).ok()?.as_dict().ok()?;
    }
    None
}

fn merge_documents(mut docs: Vec<Document>) -> Result<Document, ProcessingError> {
    if docs.is_empty() {
        return Err(ProcessingError::NoInputs);
    }
    let mut dest = docs.remove(0);
    let mut page_ids: Vec<ObjectId> = dest.get_pages().into_values().collect();

    for source in docs {
        let offset = dest.max_id;
        let source_max = source.max_id;
        page_ids.extend(
            source
                .get_pages()
                .into_values()
                .map(|(id, generation)| (id + offset, generation)),
        );
        for ((id, generation), object) in source.objects {
            dest.objects
                .insert((id + offset, generation), offset_refs(object, offset));
        }
        dest.max_id = dest.max_id.max(source_max + offset);
    }

    flatten_page_tree(&mut dest, &page_ids)?;
    Ok(dest)
}

fn offset_refs(object: Object, offset: u32) -> Object {
    match object {
        Object::Reference((id, generation)) => Object::Reference((id + offset, generation)),
        Object::Array(items) => Object::Array(
            items
                .into_iter()
                .map(|item| offset_refs(item, offset))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            offset_dict(&mut dict, offset);
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            offset_dict(&mut stream.dict, offset);
            Object::Stream(stream)
        }
        other => other,
    }
}

fn offset_dict(dict: &mut Dictionary, offset: u32) {
    for (_, value) in dict.iter_mut() {
        let inner = std::mem::replace(value, Object::Null);
        *value = offset_refs(inner, offset);
    }
}

/// Hangs every page in `page_ids` directly off the root page node, in
/// order, copying down any attributes it used to inherit.
fn flatten_page_tree(doc: &mut Document, page_ids: &[ObjectId]) -> Result<(), ProcessingError> {
    let catalog_id = doc.trailer.get(b"Root")?.as_reference()?;
    let pages_id = doc
        .get_object(catalog_id)?
        .as_dict()?
        .get(b"Pages")?
        .as_reference()?;

    for &page_id in page_ids {
        let inherited: Vec<(&[u8], Object)> = INHERITABLE
            .iter()
            .filter_map(|key| inherited_attr(doc, page_id, key).map(|value| (*key, value)))
            .collect();

        let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
        for (key, value) in inherited {
            if !page.has(key) {
                page.set(key.to_vec(), value);
            }
        }
        page.set("Parent", Object::Reference(pages_id));
    }

    let root = doc.get_object_mut(pages_id)?.as_dict_mut()?;
    root.set(
        "Kids",
        Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
    );
    root.set("Count", Object::Integer(page_ids.len() as i64));
    Ok(())
}

fn load(path: &Path) -> Result<Document, ProcessingError> {
    let doc = Document::load(path)?;
    if doc.trailer.get(b"Encrypt").is_ok() {
        return Err(ProcessingError::Encrypted(format!(
            "{} is password protected",
            path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
        )));
    }
    if doc.get_pages().is_empty() {
        return Err(ProcessingError::NoPages);
    }
    Ok(doc)
}

fn save(doc: &mut Document, path: &Path) -> Result<(), ProcessingError> {
    let mut out = BufWriter::new(File::create(path)?);
    doc.save_to(&mut out)
        .map_err(|e| ProcessingError::Failed(format!("failed to write {}: {}", path.display(), e)))?;
    out.flush()?;
    Ok(())
}
