//! Embedded cover art and comment lookup across tag schemes.
//!
//! Tagging tools disagree about where pictures live: ID3 `APIC` frames,
//! MP4 `covr` atoms, Vorbis `METADATA_BLOCK_PICTURE` base64 text, or a
//! plain picture list on the tag. Each lookup below walks a ranked chain
//! of those conventions and stops at the first one that yields data.

use lofty::file::TaggedFile;
use lofty::picture::{Picture, PictureType};
use lofty::prelude::*;
use lofty::tag::{ItemKey, ItemValue, Tag};

use super::normalize::{clean_text, coerce_bytes, coerce_text, decode_base64};

/// Extract cover-art bytes, trying each embedding convention in turn.
pub fn find_cover(file: &TaggedFile) -> Option<Vec<u8>> {
    // Front cover on the primary tag wins outright.
    if let Some(tag) = file.primary_tag().or_else(|| file.first_tag()) {
        if let Some(picture) = pick_picture(tag.pictures()) {
            return Some(picture.data().to_vec());
        }
    }

    // Secondary tags (e.g. ID3v2 alongside APE) may carry art the primary lacks.
    for tag in file.tags() {
        if let Some(picture) = pick_picture(tag.pictures()) {
            return Some(picture.data().to_vec());
        }
    }

    for tag in file.tags() {
        if let Some(data) = cover_from_items(tag) {
            return Some(data);
        }
    }

    None
}

/// Prefer the front cover, fall back to the first picture.
fn pick_picture(pictures: &[Picture]) -> Option<&Picture> {
    pictures
        .iter()
        .find(|p| p.pic_type() == PictureType::CoverFront)
        .or_else(|| pictures.first())
        .filter(|p| !p.data().is_empty())
}

/// Picture payloads hidden in raw tag items rather than the picture list.
fn cover_from_items(tag: &Tag) -> Option<Vec<u8>> {
    // ID3 APIC frames surfaced as raw binary items.
    for item in tag.items() {
        if let ItemKey::Unknown(key) = item.key() {
            if key.starts_with("APIC") {
                if let ItemValue::Binary(bytes) = item.value() {
                    if !bytes.is_empty() {
                        return Some(bytes.clone());
                    }
                }
            }
        }
    }

    // MP4 cover atom.
    for item in tag.items() {
        if let ItemKey::Unknown(key) = item.key() {
            if key.as_str() == "covr" {
                if let Some(bytes) = coerce_bytes(item.value()) {
                    return Some(bytes);
                }
            }
        }
    }

    // Vorbis picture block, base64-wrapped in a text field. Both casings
    // occur in the wild.
    for name in ["METADATA_BLOCK_PICTURE", "metadata_block_picture"] {
        for item in tag.items() {
            if let ItemKey::Unknown(key) = item.key() {
                if key.as_str() == name {
                    if let ItemValue::Text(text) = item.value() {
                        if let Some(data) =
                            decode_base64(text).and_then(|b| flac_picture_data(&b))
                        {
                            return Some(data);
                        }
                    }
                }
            }
        }
    }

    None
}

fn read_be_u32(block: &[u8], pos: &mut usize) -> Option<u32> {
    let end = pos.checked_add(4)?;
    let chunk = block.get(*pos..end)?;
    *pos = end;
    Some(u32::from_be_bytes(chunk.try_into().ok()?))
}

/// Extract the image payload from a FLAC picture block (the structure
/// `METADATA_BLOCK_PICTURE` base64-encodes). All integers are big-endian:
/// type, mime, description, dimensions, then the length-prefixed data.
pub(crate) fn flac_picture_data(block: &[u8]) -> Option<Vec<u8>> {
    let mut pos = 0usize;

    let _picture_type = read_be_u32(block, &mut pos)?;
    let mime_len = read_be_u32(block, &mut pos)? as usize;
    pos = pos.checked_add(mime_len)?;
    let desc_len = read_be_u32(block, &mut pos)? as usize;
    pos = pos.checked_add(desc_len)?;
    let _width = read_be_u32(block, &mut pos)?;
    let _height = read_be_u32(block, &mut pos)?;
    let _depth = read_be_u32(block, &mut pos)?;
    let _colors = read_be_u32(block, &mut pos)?;
    let data_len = read_be_u32(block, &mut pos)? as usize;

    let data = block.get(pos..pos.checked_add(data_len)?)?;
    if data.is_empty() {
        None
    } else {
        Some(data.to_vec())
    }
}

/// Extract free-form comment text, trying each comment convention in turn.
pub fn find_comment(file: &TaggedFile) -> Option<String> {
    if let Some(tag) = file.primary_tag().or_else(|| file.first_tag()) {
        if let Some(text) = tag.get_string(&ItemKey::Comment).and_then(clean_text) {
            return Some(text);
        }
    }

    for tag in file.tags() {
        if let Some(text) = comment_from_tag(tag) {
            return Some(text);
        }
    }

    None
}

fn comment_from_tag(tag: &Tag) -> Option<String> {
    if let Some(text) = tag.get_string(&ItemKey::Comment).and_then(clean_text) {
        return Some(text);
    }

    // Raw comment keys under the casings tag writers actually emit.
    for name in ["comment", "COMMENT", "Comment"] {
        if let Some(text) = unknown_item_text(tag, |key| key == name) {
            return Some(text);
        }
    }

    // MP4 vendor atom.
    if let Some(text) = unknown_item_text(tag, |key| key == "\u{a9}cmt") {
        return Some(text);
    }

    // ID3 comment frames surfaced raw.
    unknown_item_text(tag, |key| key.starts_with("COMM"))
}

/// First raw item whose unknown key matches, coerced to text.
fn unknown_item_text(tag: &Tag, matches: impl Fn(&str) -> bool) -> Option<String> {
    tag.items().find_map(|item| {
        let ItemKey::Unknown(key) = item.key() else {
            return None;
        };
        if matches(key.as_str()) {
            coerce_text(item.value())
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lofty::tag::{TagItem, TagType};

    fn picture_block(mime: &str, desc: &str, data: &[u8]) -> Vec<u8> {
        let mut block = Vec::new();
        block.extend_from_slice(&3u32.to_be_bytes()); // front cover
        block.extend_from_slice(&(mime.len() as u32).to_be_bytes());
        block.extend_from_slice(mime.as_bytes());
        block.extend_from_slice(&(desc.len() as u32).to_be_bytes());
        block.extend_from_slice(desc.as_bytes());
        block.extend_from_slice(&600u32.to_be_bytes());
        block.extend_from_slice(&600u32.to_be_bytes());
        block.extend_from_slice(&24u32.to_be_bytes());
        block.extend_from_slice(&0u32.to_be_bytes());
        block.extend_from_slice(&(data.len() as u32).to_be_bytes());
        block.extend_from_slice(data);
        block
    }

    #[test]
    fn flac_picture_block_round_trip() {
        let block = picture_block("image/jpeg", "cover", b"\xFF\xD8\xFFjpeg-bytes");
        assert_eq!(
            flac_picture_data(&block),
            Some(b"\xFF\xD8\xFFjpeg-bytes".to_vec())
        );
    }

    #[test]
    fn truncated_picture_block_is_rejected() {
        let block = picture_block("image/png", "", b"png-bytes");
        assert_eq!(flac_picture_data(&block[..block.len() - 4]), None);
        assert_eq!(flac_picture_data(&[0u8; 7]), None);
        assert_eq!(flac_picture_data(&[]), None);
    }

    #[test]
    fn oversized_lengths_do_not_panic() {
        let mut block = Vec::new();
        block.extend_from_slice(&3u32.to_be_bytes());
        block.extend_from_slice(&u32::MAX.to_be_bytes()); // absurd mime length
        block.extend_from_slice(b"image/jpeg");
        assert_eq!(flac_picture_data(&block), None);
    }

    #[test]
    fn comment_items_resolve_through_raw_keys() {
        let mut tag = Tag::new(TagType::VorbisComments);
        tag.push_unchecked(TagItem::new(
            ItemKey::Unknown("COMMENT".to_string()),
            ItemValue::Text("  8A opener  ".to_string()),
        ));
        assert_eq!(comment_from_tag(&tag), Some("8A opener".to_string()));
    }

    #[test]
    fn comment_prefers_the_normalized_key() {
        let mut tag = Tag::new(TagType::Id3v2);
        tag.push(TagItem::new(
            ItemKey::Unknown("COMM:desc".to_string()),
            ItemValue::Text("raw frame".to_string()),
        ));
        tag.push(TagItem::new(
            ItemKey::Comment,
            ItemValue::Text("normalized".to_string()),
        ));
        assert_eq!(comment_from_tag(&tag), Some("normalized".to_string()));
    }

    #[test]
    fn covr_atom_bytes_win_over_base64_blocks() {
        let mut tag = Tag::new(TagType::Mp4Ilst);
        tag.push_unchecked(TagItem::new(
            ItemKey::Unknown("covr".to_string()),
            ItemValue::Binary(b"\xFF\xD8\xFFatom".to_vec()),
        ));
        assert_eq!(cover_from_items(&tag), Some(b"\xFF\xD8\xFFatom".to_vec()));
    }

    #[test]
    fn base64_picture_block_item_is_decoded() {
        use base64::Engine as _;
        let block = picture_block("image/jpeg", "", b"jpeg-data");
        let encoded = base64::engine::general_purpose::STANDARD.encode(&block);

        let mut tag = Tag::new(TagType::VorbisComments);
        tag.push_unchecked(TagItem::new(
            ItemKey::Unknown("METADATA_BLOCK_PICTURE".to_string()),
            ItemValue::Text(encoded),
        ));
        assert_eq!(cover_from_items(&tag), Some(b"jpeg-data".to_vec()));
    }

    #[test]
    fn empty_pictures_are_skipped() {
        assert!(pick_picture(&[]).is_none());
    }
}
