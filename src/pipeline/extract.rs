//! Extraction: pull embedded images and paragraph text out of a `.docx`.
//!
//! A `.docx` is an OPC package: a ZIP archive of XML parts tied together by
//! relationship files. We read three things from it:
//!
//! 1. `_rels/.rels` to find the main document part (almost always
//!    `word/document.xml`);
//! 2. that part's relationship file, in file order. Every relationship whose
//!    type mentions `image` yields one image. This is relationship order,
//!    not the order images appear on the page;
//! 3. the main part's body, one string per top-level `w:p`.
//!
//! Parsing is synchronous ZIP + XML work, so the async entry points run it on
//! `spawn_blocking`.

use crate::config::ImageNaming;
use crate::error::SlideshowError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::result::ZipError;
use zip::ZipArchive;

const ROOT_RELS: &str = "_rels/.rels";
const DEFAULT_MAIN_PART: &str = "word/document.xml";
const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";

/// An image payload as stored in the package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub rel_id: String,
    /// Package part name, e.g. `word/media/image3.jpeg`.
    pub part_name: String,
    pub bytes: Vec<u8>,
}

/// Everything the pipeline needs from a document, held in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceDocument {
    /// In relationship order.
    pub images: Vec<EmbeddedImage>,
    /// One entry per body paragraph, blanks included.
    pub paragraphs: Vec<String>,
}

/// An image written to the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub path: PathBuf,
    pub part_name: String,
}

/// Output of the extraction stage.
#[derive(Debug, Clone, Default)]
pub struct ExtractedContent {
    pub images: Vec<ImageAsset>,
    pub paragraphs: Vec<String>,
}

impl ExtractedContent {
    pub fn image_paths(&self) -> Vec<PathBuf> {
        self.images.iter().map(|i| i.path.clone()).collect()
    }
}

/// Extract images into `dir` and collect paragraph text.
pub async fn extract(
    doc_path: &Path,
    dir: &Path,
    naming: ImageNaming,
) -> Result<ExtractedContent, SlideshowError> {
    let doc_path = doc_path.to_path_buf();
    let dir = dir.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let document = read_document(&doc_path)?;
        let images = write_images(&document, &dir, naming)?;
        info!(
            "Extracted {} images and {} paragraphs from {}",
            images.len(),
            document.paragraphs.len(),
            doc_path.display()
        );
        Ok(ExtractedContent {
            images,
            paragraphs: document.paragraphs,
        })
    })
    .await
    .map_err(|e| SlideshowError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Parse a document without writing anything to disk.
pub async fn load_document(doc_path: &Path) -> Result<SourceDocument, SlideshowError> {
    let doc_path = doc_path.to_path_buf();
    tokio::task::spawn_blocking(move || read_document(&doc_path))
        .await
        .map_err(|e| SlideshowError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Blocking: open, validate and parse the package at `path`.
pub fn read_document(path: &Path) -> Result<SourceDocument, SlideshowError> {
    let file = open_local(path)?;
    read_package(file, path)
}

/// Blocking: parse a package from any seekable reader.
///
/// `label` is only used in error messages.
pub fn read_package<R: Read + Seek>(
    reader: R,
    label: &Path,
) -> Result<SourceDocument, SlideshowError> {
    let mut archive = ZipArchive::new(reader).map_err(|e| SlideshowError::NotADocx {
        path: label.to_path_buf(),
        detail: e.to_string(),
    })?;

    let main_part = find_main_part(&mut archive)?;
    debug!("Main document part: {}", main_part);

    let document_xml =
        read_part(&mut archive, &main_part)?.ok_or_else(|| SlideshowError::MissingPart {
            part: main_part.clone(),
        })?;

    let images = read_images(&mut archive, &main_part)?;
    let paragraphs = parse_paragraphs(&document_xml, &main_part)?;

    Ok(SourceDocument { images, paragraphs })
}

/// Write each image as `image{n}.{ext}` in relationship order.
pub fn write_images(
    document: &SourceDocument,
    dir: &Path,
    naming: ImageNaming,
) -> Result<Vec<ImageAsset>, SlideshowError> {
    let mut assets = Vec::with_capacity(document.images.len());

    for (i, image) in document.images.iter().enumerate() {
        let ext = match naming {
            ImageNaming::AlwaysPng => "png".to_string(),
            ImageNaming::DetectFormat => detect_extension(&image.bytes, &image.part_name),
        };
        let path = dir.join(format!("image{}.{}", i + 1, ext));
        std::fs::write(&path, &image.bytes).map_err(|source| {
            SlideshowError::ImageWriteFailed {
                path: path.clone(),
                source,
            }
        })?;
        debug!(
            "Wrote {} ({} bytes) from {}",
            path.display(),
            image.bytes.len(),
            image.part_name
        );
        assets.push(ImageAsset {
            path,
            part_name: image.part_name.clone(),
        });
    }

    Ok(assets)
}

/// File extension for an image payload: sniffed format, else the part's own
/// extension, else `png`.
pub fn detect_extension(bytes: &[u8], part_name: &str) -> String {
    if let Some(ext) = image::guess_format(bytes)
        .ok()
        .and_then(|f| f.extensions_str().first().copied())
    {
        return ext.to_string();
    }
    Path::new(part_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "png".to_string())
}

// ── Package helpers ──────────────────────────────────────────────────────

/// Validate that `path` exists, is readable and starts like a ZIP file.
fn open_local(path: &Path) -> Result<std::fs::File, SlideshowError> {
    if !path.exists() {
        return Err(SlideshowError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(SlideshowError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(SlideshowError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    };

    let mut magic = [0u8; 4];
    if file.read_exact(&mut magic).is_err() || &magic != ZIP_MAGIC {
        return Err(SlideshowError::NotADocx {
            path: path.to_path_buf(),
            detail: format!("not a ZIP archive (first bytes {:?})", magic),
        });
    }
    file.rewind().map_err(|e| SlideshowError::NotADocx {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;

    Ok(file)
}

/// Read a part by name. Part names are case-insensitive in OPC, so fall back
/// to a case-insensitive lookup when the exact name is absent.
fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<Vec<u8>>, SlideshowError> {
    let actual = if archive.index_for_name(name).is_some() {
        name.to_string()
    } else {
        match archive
            .file_names()
            .find(|n| n.eq_ignore_ascii_case(name))
            .map(str::to_string)
        {
            Some(n) => n,
            None => return Ok(None),
        }
    };

    let mut entry = match archive.by_name(&actual) {
        Ok(e) => e,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => {
            return Err(SlideshowError::MalformedXml {
                part: name.to_string(),
                detail: e.to_string(),
            })
        }
    };

    let mut buf = Vec::with_capacity(entry.size() as usize);
    entry
        .read_to_end(&mut buf)
        .map_err(|e| SlideshowError::MalformedXml {
            part: name.to_string(),
            detail: e.to_string(),
        })?;
    Ok(Some(buf))
}

fn find_main_part<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<String, SlideshowError> {
    let Some(xml) = read_part(archive, ROOT_RELS)? else {
        debug!("No {}; assuming {}", ROOT_RELS, DEFAULT_MAIN_PART);
        return Ok(DEFAULT_MAIN_PART.to_string());
    };

    let main = parse_relationships(&xml, ROOT_RELS)?
        .into_iter()
        .find(|r| !r.external && r.rel_type.ends_with("/officeDocument"))
        .map(|r| resolve_target("", &r.target));

    Ok(main.unwrap_or_else(|| DEFAULT_MAIN_PART.to_string()))
}

fn read_images<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    main_part: &str,
) -> Result<Vec<EmbeddedImage>, SlideshowError> {
    let rels_part = rels_part_for(main_part);
    let Some(xml) = read_part(archive, &rels_part)? else {
        debug!("No {}; document has no relationships", rels_part);
        return Ok(Vec::new());
    };

    let base = part_dir(main_part);
    let mut images = Vec::new();

    for rel in parse_relationships(&xml, &rels_part)? {
        if !rel.rel_type.contains("image") {
            continue;
        }
        if rel.external {
            warn!(
                "Skipping linked image {} → {} (not embedded in the package)",
                rel.id, rel.target
            );
            continue;
        }

        let part_name = resolve_target(base, &rel.target);
        let bytes = read_part(archive, &part_name)?
            .ok_or_else(|| SlideshowError::MissingPart {
                part: part_name.clone(),
            })?;

        images.push(EmbeddedImage {
            rel_id: rel.id,
            part_name,
            bytes,
        });
    }

    Ok(images)
}

// ── Relationships ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
struct Relationship {
    id: String,
    rel_type: String,
    target: String,
    external: bool,
}

/// Parse a `.rels` part in file order.
///
/// A repeated `Id` keeps its first position but takes the later target.
fn parse_relationships(xml: &[u8], part: &str) -> Result<Vec<Relationship>, SlideshowError> {
    let mut reader = Reader::from_reader(strip_bom(xml));
    let mut buf = Vec::new();
    let mut rels: Vec<Relationship> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let rel = relationship_from(e, part)?;
                match rels.iter_mut().find(|r| r.id == rel.id) {
                    Some(existing) => *existing = rel,
                    None => rels.push(rel),
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(SlideshowError::MalformedXml {
                    part: part.to_string(),
                    detail: e.to_string(),
                })
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

fn relationship_from(e: &BytesStart<'_>, part: &str) -> Result<Relationship, SlideshowError> {
    let mut rel = Relationship {
        id: String::new(),
        rel_type: String::new(),
        target: String::new(),
        external: false,
    };

    for attr in e.attributes().flatten() {
        let value = attr
            .unescape_value()
            .map_err(|err| SlideshowError::MalformedXml {
                part: part.to_string(),
                detail: err.to_string(),
            })?
            .into_owned();
        match attr.key.as_ref() {
            b"Id" => rel.id = value,
            b"Type" => rel.rel_type = value,
            b"Target" => rel.target = value,
            b"TargetMode" => rel.external = value.eq_ignore_ascii_case("External"),
            _ => {}
        }
    }

    Ok(rel)
}

/// `word/document.xml` → `word/_rels/document.xml.rels`
fn rels_part_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, name)) => format!("{}/_rels/{}.rels", dir, name),
        None => format!("_rels/{}.rels", part),
    }
}

fn part_dir(part: &str) -> &str {
    part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Resolve a relationship target against the source part's directory.
///
/// Absolute targets (`/word/media/x.png`) start at the package root; `.` and
/// `..` segments are normalised.
fn resolve_target(base_dir: &str, target: &str) -> String {
    let joined = match target.strip_prefix('/') {
        Some(abs) => abs.to_string(),
        None if base_dir.is_empty() => target.to_string(),
        None => format!("{}/{}", base_dir, target),
    };

    let mut segments: Vec<&str> = Vec::new();
    for seg in joined.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

// ── Paragraphs ───────────────────────────────────────────────────────────

/// One string per `w:p` that is a direct child of `w:body`.
///
/// Elements are matched by local name, so any prefix bound to the
/// WordprocessingML namespace works. Paragraph text comes from the runs that
/// are direct children of the paragraph or of a direct `w:hyperlink`, and
/// within a run only from its direct `w:t` (plus tab/break children).
/// Runs wrapped in `w:ins`, `w:smartTag`, `w:fldSimple` and the like are not
/// read, and neither are tables or text boxes.
fn parse_paragraphs(xml: &[u8], part: &str) -> Result<Vec<String>, SlideshowError> {
    let mut reader = Reader::from_reader(strip_bom(xml));
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();

    // Depth of the element about to open (or of the empty element).
    let mut depth = 0usize;
    // Depth at which direct children of w:body open.
    let mut body_children: Option<usize> = None;
    // Open body paragraph: (depth it opened at, text so far).
    let mut para: Option<(usize, String)> = None;
    let mut hyperlink: Option<usize> = None;
    let mut run: Option<usize> = None;
    let mut in_text = false;

    let malformed = |e: quick_xml::Error| SlideshowError::MalformedXml {
        part: part.to_string(),
        detail: e.to_string(),
    };

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let para_depth = para.as_ref().map(|(d, _)| *d);
                let run_child = run.map(|r| r + 1) == Some(depth);
                match e.local_name().as_ref() {
                    b"body" => body_children = Some(depth + 1),
                    b"p" if para.is_none() && body_children == Some(depth) => {
                        para = Some((depth, String::new()));
                    }
                    b"hyperlink" if para_depth.map(|d| d + 1) == Some(depth) => {
                        hyperlink = Some(depth);
                    }
                    b"r" if run.is_none()
                        && (para_depth.map(|d| d + 1) == Some(depth)
                            || hyperlink.map(|h| h + 1) == Some(depth)) =>
                    {
                        run = Some(depth);
                    }
                    b"t" if run_child => in_text = true,
                    _ if run_child => push_run_child(&e, &mut para),
                    _ => {}
                }
                depth += 1;
            }
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"p"
                    && para.is_none()
                    && body_children == Some(depth)
                {
                    paragraphs.push(String::new());
                } else if run.map(|r| r + 1) == Some(depth) {
                    push_run_child(&e, &mut para);
                }
            }
            Ok(Event::Text(t)) if in_text => {
                if let Some((_, text)) = para.as_mut() {
                    text.push_str(&t.unescape().map_err(malformed)?);
                }
            }
            Ok(Event::CData(t)) if in_text => {
                if let Some((_, text)) = para.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Ok(Event::End(e)) => {
                depth = depth.saturating_sub(1);
                match e.local_name().as_ref() {
                    b"t" => in_text = false,
                    b"r" if run == Some(depth) => run = None,
                    b"hyperlink" if hyperlink == Some(depth) => hyperlink = None,
                    b"p" if para.as_ref().is_some_and(|(d, _)| *d == depth) => {
                        if let Some((_, text)) = para.take() {
                            paragraphs.push(text);
                        }
                        hyperlink = None;
                        run = None;
                    }
                    b"body" => body_children = None,
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(malformed(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs)
}

/// Text contributed by a non-`w:t` child of a run.
fn push_run_child(e: &BytesStart<'_>, para: &mut Option<(usize, String)>) {
    let Some((_, text)) = para.as_mut() else {
        return;
    };
    match e.local_name().as_ref() {
        b"tab" | b"ptab" => text.push('\t'),
        b"cr" => text.push('\n'),
        // Page and column breaks are layout, not text.
        b"br" if is_line_break(e) => text.push('\n'),
        b"noBreakHyphen" => text.push('-'),
        _ => {}
    }
}

fn is_line_break(e: &BytesStart<'_>) -> bool {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == b"type")
        .map_or(true, |a| a.value.as_ref() == b"textWrapping")
}

fn strip_bom(xml: &[u8]) -> &[u8] {
    xml.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(xml)
}
