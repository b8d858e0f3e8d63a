//! `.pptx` export of a [`Presentation`].
//!
//! Writes a minimal PresentationML package: one master, one blank layout, one
//! theme, and a slide part per deck slide. The first slide is a title slide
//! (accent band, centered headline, subtitle from its first bullet); the rest
//! get a header bar, a bulleted body and a slide number. `**emphasis**`
//! markers are view-only and are stripped from exported bullet text.

use std::io::{Cursor, Write};

use thiserror::Error;
use zip::write::{SimpleFileOptions, ZipWriter};

use crate::models::{Presentation, Slide};

pub const PPTX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";

const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
const NS_RELS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

const EMU_PER_INCH: f64 = 914_400.0;
// 16:9, 10" x 5.625"
const SLIDE_WIDTH: i64 = 9_144_000;
const SLIDE_HEIGHT: i64 = 5_143_500;
const FIRST_SLIDE_ID: usize = 256;

const COLOR_PRIMARY: &str = "5B21B6";
const COLOR_SECONDARY: &str = "2563EB";
const COLOR_TEXT: &str = "1F2937";
const COLOR_LIGHT_BG: &str = "F3F4F6";
const COLOR_SUBTITLE: &str = "6B7280";
const COLOR_SLIDE_NUMBER: &str = "9CA3AF";
const COLOR_WHITE: &str = "FFFFFF";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Presentation has no slides to export")]
    EmptyPresentation,
    #[error("Failed to write slide archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Failed to write slide archive: {0}")]
    Io(#[from] std::io::Error),
}

/// Removes `**text**` emphasis pairs, keeping the inner text.
pub fn strip_emphasis(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find("**") {
        let after_open = &rest[open + 2..];
        // An emphasis span needs at least one character between the markers.
        let close = after_open
            .char_indices()
            .nth(1)
            .and_then(|(skip, _)| after_open[skip..].find("**").map(|i| i + skip));
        match close {
            Some(close) => {
                out.push_str(&rest[..open]);
                out.push_str(&after_open[..close]);
                rest = &after_open[close + 2..];
            }
            None => {
                out.push_str(&rest[..open + 1]);
                rest = &rest[open + 1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Escapes XML metacharacters and drops characters XML 1.0 cannot carry.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(' '),
            c if (c as u32) < 0x20 => {}
            c => out.push(c),
        }
    }
    out
}

/// Download name derived from the deck title.
pub fn file_name(presentation: &Presentation) -> String {
    let stem: String = presentation
        .title
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let stem = stem.trim_matches('_');
    if stem.is_empty() {
        "presentation.pptx".to_string()
    } else {
        format!("{stem}.pptx")
    }
}

/// Serializes the deck into `.pptx` bytes.
pub fn export_pptx(presentation: &Presentation) -> Result<Vec<u8>, ExportError> {
    if presentation.slides.is_empty() {
        return Err(ExportError::EmptyPresentation);
    }
    let count = presentation.slides.len();

    let mut package = PackageWriter::new();
    package.add_file("[Content_Types].xml", &content_types_xml(count))?;
    package.add_file("_rels/.rels", &root_rels_xml())?;
    package.add_file("docProps/core.xml", &core_props_xml(presentation))?;
    package.add_file("docProps/app.xml", &app_props_xml(count))?;
    package.add_file("ppt/presentation.xml", &presentation_xml(count))?;
    package.add_file("ppt/_rels/presentation.xml.rels", &presentation_rels_xml(count))?;
    package.add_file("ppt/slideMasters/slideMaster1.xml", &slide_master_xml())?;
    package.add_file(
        "ppt/slideMasters/_rels/slideMaster1.xml.rels",
        &relationships(&[
            ("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml"),
            ("rId2", "theme", "../theme/theme1.xml"),
        ]),
    )?;
    package.add_file("ppt/slideLayouts/slideLayout1.xml", &slide_layout_xml())?;
    package.add_file(
        "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
        &relationships(&[("rId1", "slideMaster", "../slideMasters/slideMaster1.xml")]),
    )?;
    package.add_file("ppt/theme/theme1.xml", &theme_xml())?;

    for (index, slide) in presentation.slides.iter().enumerate() {
        let number = index + 1;
        let xml = if index == 0 {
            title_slide_xml(slide)
        } else {
            content_slide_xml(slide, number)
        };
        package.add_file(&format!("ppt/slides/slide{number}.xml"), &xml)?;
        package.add_file(
            &format!("ppt/slides/_rels/slide{number}.xml.rels"),
            &relationships(&[("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml")]),
        )?;
    }

    let bytes = package.finish()?;
    log::info!(
        "Exported presentation {} ({} slides, {} bytes)",
        presentation.id,
        count,
        bytes.len()
    );
    Ok(bytes)
}

// In-memory ZIP container for the package parts
struct PackageWriter {
    zip_writer: ZipWriter<Cursor<Vec<u8>>>,
}

impl PackageWriter {
    fn new() -> Self {
        Self {
            zip_writer: ZipWriter::new(Cursor::new(Vec::new())),
        }
    }

    fn add_file(&mut self, path: &str, content: &str) -> Result<(), ExportError> {
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        self.zip_writer.start_file(path, options)?;
        self.zip_writer.write_all(content.as_bytes())?;
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>, ExportError> {
        Ok(self.zip_writer.finish()?.into_inner())
    }
}

fn emu(inches: f64) -> i64 {
    (inches * EMU_PER_INCH).round() as i64
}

#[derive(Clone, Copy, PartialEq)]
enum Align {
    Left,
    Center,
    Right,
}

impl Align {
    fn attr(self) -> &'static str {
        match self {
            Align::Left => "l",
            Align::Center => "ctr",
            Align::Right => "r",
        }
    }
}

struct TextRun<'a> {
    text: &'a str,
    size_pt: u32,
    bold: bool,
    color: &'a str,
    align: Align,
    bullet: bool,
}

impl<'a> TextRun<'a> {
    fn plain(text: &'a str, size_pt: u32, color: &'a str) -> Self {
        Self { text, size_pt, bold: false, color, align: Align::Left, bullet: false }
    }

    fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    fn align(mut self, align: Align) -> Self {
        self.align = align;
        self
    }

    fn bullet(mut self) -> Self {
        self.bullet = true;
        self
    }

    fn to_xml(&self) -> String {
        let bullet = if self.bullet {
            // Space after bullets: 12pt
            r#" marL="285750" indent="-285750"><a:spcAft><a:spcPts val="1200"/></a:spcAft><a:buFont typeface="Arial"/><a:buChar char="•"/></a:pPr>"#
        } else {
            "><a:buNone/></a:pPr>"
        };
        format!(
            r#"<a:p><a:pPr algn="{}"{}<a:r><a:rPr lang="en-US" sz="{}" b="{}" dirty="0"><a:solidFill><a:srgbClr val="{}"/></a:solidFill></a:rPr><a:t>{}</a:t></a:r></a:p>"#,
            self.align.attr(),
            bullet,
            self.size_pt * 100,
            u8::from(self.bold),
            self.color,
            escape_xml(self.text),
        )
    }
}

fn xfrm(x: f64, y: f64, w: f64, h: f64) -> String {
    format!(
        r#"<a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></a:xfrm>"#,
        emu(x),
        emu(y),
        emu(w),
        emu(h)
    )
}

fn rect_shape(id: u32, name: &str, x: f64, y: f64, w: f64, h: f64, fill: &str) -> String {
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="{name}"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr>{}<a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:solidFill><a:srgbClr val="{fill}"/></a:solidFill><a:ln><a:noFill/></a:ln></p:spPr></p:sp>"#,
        xfrm(x, y, w, h)
    )
}

#[allow(clippy::too_many_arguments)]
fn text_shape(id: u32, name: &str, x: f64, y: f64, w: f64, h: f64, anchor: &str, runs: &[TextRun<'_>]) -> String {
    let paragraphs: String = runs.iter().map(TextRun::to_xml).collect();
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="{name}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr>{}<a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/></p:spPr><p:txBody><a:bodyPr wrap="square" rtlCol="0" anchor="{anchor}"><a:normAutofit/></a:bodyPr><a:lstStyle/>{paragraphs}</p:txBody></p:sp>"#,
        xfrm(x, y, w, h)
    )
}

fn slide_xml(shapes: &str) -> String {
    format!(
        r#"{XML_DECL}<p:sld xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"><p:cSld><p:bg><p:bgPr><a:solidFill><a:srgbClr val="{COLOR_WHITE}"/></a:solidFill><a:effectLst/></p:bgPr></p:bg><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>{shapes}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#
    )
}

fn title_slide_xml(slide: &Slide) -> String {
    let mut shapes = rect_shape(2, "Accent", 0.0, 0.0, 10.0, 1.5, COLOR_PRIMARY);
    shapes.push_str(&text_shape(
        3,
        "Title",
        0.5,
        2.0,
        9.0,
        1.5,
        "ctr",
        &[TextRun::plain(&slide.title, 44, COLOR_TEXT).bold().align(Align::Center)],
    ));
    if let Some(first) = slide.content.first() {
        let subtitle = strip_emphasis(first);
        shapes.push_str(&text_shape(
            4,
            "Subtitle",
            0.5,
            3.7,
            9.0,
            0.8,
            "t",
            &[TextRun::plain(&subtitle, 18, COLOR_SUBTITLE).align(Align::Center)],
        ));
    }
    slide_xml(&shapes)
}

fn content_slide_xml(slide: &Slide, number: usize) -> String {
    let mut shapes = rect_shape(2, "Header", 0.0, 0.0, 10.0, 0.8, COLOR_PRIMARY);
    shapes.push_str(&text_shape(
        3,
        "Title",
        0.5,
        0.15,
        9.0,
        0.5,
        "ctr",
        &[TextRun::plain(&slide.title, 24, COLOR_WHITE).bold()],
    ));

    let bullets: Vec<String> = slide.content.iter().map(|b| strip_emphasis(b)).collect();
    if !bullets.is_empty() {
        let runs: Vec<TextRun<'_>> = bullets
            .iter()
            .map(|b| TextRun::plain(b, 18, COLOR_TEXT).bullet())
            .collect();
        shapes.push_str(&text_shape(4, "Body", 0.8, 1.2, 8.4, 3.6, "t", &runs));
    }

    let number = number.to_string();
    shapes.push_str(&text_shape(
        5,
        "Slide Number",
        9.2,
        5.1,
        0.5,
        0.3,
        "ctr",
        &[TextRun::plain(&number, 12, COLOR_SLIDE_NUMBER).align(Align::Right)],
    ));
    slide_xml(&shapes)
}

fn relationships(rels: &[(&str, &str, &str)]) -> String {
    let body: String = rels
        .iter()
        .map(|(id, kind, target)| {
            format!(r#"<Relationship Id="{id}" Type="{REL_BASE}/{kind}" Target="{target}"/>"#)
        })
        .collect();
    format!(r#"{XML_DECL}<Relationships xmlns="{NS_RELS}">{body}</Relationships>"#)
}

fn root_rels_xml() -> String {
    format!(
        r#"{XML_DECL}<Relationships xmlns="{NS_RELS}"><Relationship Id="rId1" Type="{REL_BASE}/officeDocument" Target="ppt/presentation.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/><Relationship Id="rId3" Type="{REL_BASE}/extended-properties" Target="docProps/app.xml"/></Relationships>"#
    )
}

fn content_types_xml(slide_count: usize) -> String {
    let slides: String = (1..=slide_count)
        .map(|n| {
            format!(r#"<Override PartName="/ppt/slides/slide{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>"#)
        })
        .collect();
    format!(
        r#"{XML_DECL}<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/><Override PartName="/ppt/slideMasters/slideMaster1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml"/><Override PartName="/ppt/slideLayouts/slideLayout1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"/><Override PartName="/ppt/theme/theme1.xml" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/>{slides}<Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/><Override PartName="/docProps/app.xml" ContentType="application/vnd.openxmlformats-officedocument.extended-properties+xml"/></Types>"#
    )
}

fn core_props_xml(presentation: &Presentation) -> String {
    let created = presentation
        .created_at
        .unwrap_or_else(chrono::Utc::now)
        .format("%Y-%m-%dT%H:%M:%SZ");
    format!(
        r#"{XML_DECL}<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><dc:title>{}</dc:title><dc:subject>{}</dc:subject><dc:creator>AI Presentation Generator</dc:creator><dcterms:created xsi:type="dcterms:W3CDTF">{created}</dcterms:created></cp:coreProperties>"#,
        escape_xml(&presentation.title),
        escape_xml(presentation.description.as_deref().unwrap_or_default()),
    )
}

fn app_props_xml(slide_count: usize) -> String {
    format!(
        r#"{XML_DECL}<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties"><Application>slidesmith</Application><Slides>{slide_count}</Slides><Company>AI Slides</Company></Properties>"#
    )
}

fn presentation_xml(slide_count: usize) -> String {
    // rId1 is the master, rId2 the theme; slides follow from rId3.
    let slide_ids: String = (0..slide_count)
        .map(|i| format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, FIRST_SLIDE_ID + i, i + 3))
        .collect();
    format!(
        r#"{XML_DECL}<p:presentation xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}" saveSubsetFonts="1"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst><p:sldIdLst>{slide_ids}</p:sldIdLst><p:sldSz cx="{SLIDE_WIDTH}" cy="{SLIDE_HEIGHT}"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#
    )
}

fn presentation_rels_xml(slide_count: usize) -> String {
    let mut rels = vec![
        ("rId1".to_string(), "slideMaster", "slideMasters/slideMaster1.xml".to_string()),
        ("rId2".to_string(), "theme", "theme/theme1.xml".to_string()),
    ];
    rels.extend((1..=slide_count).map(|n| (format!("rId{}", n + 2), "slide", format!("slides/slide{n}.xml"))));
    let borrowed: Vec<(&str, &str, &str)> = rels
        .iter()
        .map(|(id, kind, target)| (id.as_str(), *kind, target.as_str()))
        .collect();
    relationships(&borrowed)
}

const EMPTY_SP_TREE: &str = r#"<p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/></p:spTree>"#;

fn slide_master_xml() -> String {
    format!(
        r#"{XML_DECL}<p:sldMaster xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"><p:cSld>{EMPTY_SP_TREE}</p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst></p:sldMaster>"#
    )
}

fn slide_layout_xml() -> String {
    format!(
        r#"{XML_DECL}<p:sldLayout xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}" type="blank" preserve="1"><p:cSld name="Blank">{EMPTY_SP_TREE}</p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#
    )
}

fn theme_xml() -> String {
    let color = |name: &str, val: &str| format!(r#"<a:{name}><a:srgbClr val="{val}"/></a:{name}>"#);
    let colors = [
        color("dk1", "000000"),
        color("lt1", COLOR_WHITE),
        color("dk2", COLOR_TEXT),
        color("lt2", COLOR_LIGHT_BG),
        color("accent1", COLOR_PRIMARY),
        color("accent2", COLOR_SECONDARY),
        color("accent3", "059669"),
        color("accent4", "D97706"),
        color("accent5", "DC2626"),
        color("accent6", "0891B2"),
        color("hlink", COLOR_SECONDARY),
        color("folHlink", COLOR_PRIMARY),
    ]
    .concat();
    let font = r#"<a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/>"#;
    let fill = r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#;
    let line = format!(r#"<a:ln w="6350">{fill}</a:ln>"#);
    let effect = "<a:effectStyle><a:effectLst/></a:effectStyle>";
    format!(
        r#"{XML_DECL}<a:theme xmlns:a="{NS_A}" name="Slidesmith"><a:themeElements><a:clrScheme name="Slidesmith">{colors}</a:clrScheme><a:fontScheme name="Slidesmith"><a:majorFont>{font}</a:majorFont><a:minorFont>{font}</a:minorFont></a:fontScheme><a:fmtScheme name="Slidesmith"><a:fillStyleLst>{fills}</a:fillStyleLst><a:lnStyleLst>{lines}</a:lnStyleLst><a:effectStyleLst>{effects}</a:effectStyleLst><a:bgFillStyleLst>{fills}</a:bgFillStyleLst></a:fmtScheme></a:themeElements></a:theme>"#,
        fills = fill.repeat(3),
        lines = line.repeat(3),
        effects = effect.repeat(3),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emphasis_markers_are_removed() {
        assert_eq!(strip_emphasis("**Solar** is **cheap** now"), "Solar is cheap now");
        assert_eq!(strip_emphasis("no markers"), "no markers");
        assert_eq!(strip_emphasis("dangling ** marker"), "dangling ** marker");
        assert_eq!(strip_emphasis("empty **** pair"), "empty **** pair");
    }

    #[test]
    fn xml_text_is_escaped() {
        assert_eq!(escape_xml("R&D <fast> \"now\"\u{1}"), "R&amp;D &lt;fast&gt; &quot;now&quot;");
    }

    #[test]
    fn file_name_is_sanitized() {
        let mut deck = Presentation {
            id: "p".into(),
            title: "Solar energy: 2030?".into(),
            description: None,
            slides: Vec::new(),
            created_at: None,
            updated_at: None,
        };
        assert_eq!(file_name(&deck), "Solar_energy__2030.pptx");
        deck.title = "???".into();
        assert_eq!(file_name(&deck), "presentation.pptx");
    }

    #[test]
    fn empty_deck_is_rejected() {
        let deck = Presentation {
            id: "p".into(),
            title: "Empty".into(),
            description: None,
            slides: Vec::new(),
            created_at: None,
            updated_at: None,
        };
        assert!(matches!(export_pptx(&deck), Err(ExportError::EmptyPresentation)));
    }

    #[test]
    fn bullet_paragraph_uses_bullet_char() {
        let xml = TextRun::plain("Point", 18, COLOR_TEXT).bullet().to_xml();
        assert!(xml.contains(r#"<a:buChar char="•"/>"#));
        assert!(xml.contains(r#"sz="1800""#));
        let xml = TextRun::plain("Title", 44, COLOR_TEXT).bold().align(Align::Center).to_xml();
        assert!(xml.contains(r#"algn="ctr""#));
        assert!(xml.contains(r#"b="1""#));
        assert!(xml.contains("<a:buNone/>"));
    }
}
