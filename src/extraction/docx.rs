//! Paragraph text from Office Open XML word-processing documents.

use super::types::DocxError;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesRef, Event};
use quick_xml::reader::Reader;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

const MAIN_PART: &str = "word/document.xml";

/// Concatenate the text of every paragraph in the document, one line per paragraph.
pub fn read_paragraphs(path: &Path) -> Result<String, DocxError> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file)?;
    let mut xml = String::new();
    archive.by_name(MAIN_PART)?.read_to_string(&mut xml)?;
    paragraphs_from_xml(&xml)
}

/// Walk `word/document.xml`, keeping run text and closing each `w:p` with a newline.
pub(crate) fn paragraphs_from_xml(xml: &str) -> Result<String, DocxError> {
    let mut reader = Reader::from_str(xml);
    let mut text = String::new();
    let mut in_run = false;
    let mut in_text = false;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(tag) => match tag.local_name().as_ref() {
                b"r" => in_run = true,
                b"t" => in_text = in_run,
                _ => {}
            },
            Event::End(tag) => match tag.local_name().as_ref() {
                b"r" => in_run = false,
                b"t" => in_text = false,
                b"p" => text.push('\n'),
                _ => {}
            },
            Event::Empty(tag) => match tag.local_name().as_ref() {
                b"tab" if in_run => text.push('\t'),
                b"br" | b"cr" if in_run => text.push('\n'),
                b"p" => text.push('\n'),
                _ => {}
            },
            Event::Text(chunk) if in_text => {
                text.push_str(&chunk.decode().map_err(xml_error)?);
            }
            Event::GeneralRef(entity) if in_text => push_entity(&mut text, &entity)?,
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(text)
}

fn push_entity(text: &mut String, entity: &BytesRef<'_>) -> Result<(), DocxError> {
    if let Some(ch) = entity.resolve_char_ref().map_err(xml_error)? {
        text.push(ch);
        return Ok(());
    }
    let name = entity.decode().map_err(xml_error)?;
    if let Some(resolved) = resolve_predefined_entity(&name) {
        text.push_str(resolved);
    }
    Ok(())
}

fn xml_error(error: impl std::fmt::Display) -> DocxError {
    DocxError::Xml(error.to_string())
}
