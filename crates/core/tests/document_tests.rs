//! Document structure tests: xref parsing, incremental updates, repair.

mod common;

use common::{append_revision, build_pdf, obj, single_page_pdf, stream_obj};
use tinta_core::document::catalog::XRefEntry;
use tinta_core::{Document, ObjRef, Object, OpenOptions, ParseMode, PdfDocument, PdfError};

fn strict() -> OpenOptions {
    OpenOptions {
        mode: ParseMode::Strict,
    }
}

#[test]
fn parses_header_version_and_page_count() {
    let pdf = single_page_pdf("BT /F1 12 Tf (x) Tj ET");
    let doc = PdfDocument::from_bytes(&pdf, strict()).unwrap();
    assert_eq!(doc.page_count(), 1);
    assert_eq!(doc.info().version.as_deref(), Some("1.4"));
}

#[test]
fn in_use_entries_point_at_matching_headers() {
    let pdf = single_page_pdf("BT /F1 12 Tf (x) Tj ET");
    let doc = Document::from_bytes(&pdf, strict()).unwrap();
    for objid in 1..=5u32 {
        match doc.lookup(objid) {
            Some(XRefEntry::InUse { offset, .. }) => {
                let header = format!("{} 0 obj", objid);
                assert!(
                    doc.bytes()[offset..].starts_with(header.as_bytes()),
                    "object {} offset {} does not start with its header",
                    objid,
                    offset
                );
            }
            other => panic!("object {}: unexpected entry {:?}", objid, other),
        }
    }
}

#[test]
fn incremental_update_shadows_older_revision() {
    let objects = vec![
        obj(1, "<< /Type /Catalog /Pages 2 0 R >>"),
        obj(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>"),
        obj(
            3,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 5 0 R >> >> /Contents 4 0 R >>",
        ),
        (4, stream_obj("", b"BT /F1 12 Tf 72 700 Td (A) Tj ET")),
        obj(
            5,
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>",
        ),
    ];
    let (mut pdf, first_xref) = build_pdf(&objects, "/Root 1 0 R");

    // First revision reads "A".
    let doc = PdfDocument::from_bytes(&pdf, strict()).unwrap();
    let text = doc.extract_text(None, &Default::default()).unwrap();
    assert!(text.contains('A'));
    assert!(!text.contains('B'));

    // The appended revision remaps object 4 to "B".
    append_revision(
        &mut pdf,
        &[(4, stream_obj("", b"BT /F1 12 Tf 72 700 Td (B) Tj ET"))],
        first_xref,
        "/Root 1 0 R",
    );
    let doc = PdfDocument::from_bytes(&pdf, strict()).unwrap();
    let text = doc.extract_text(None, &Default::default()).unwrap();
    assert!(text.contains('B'));
    assert!(!text.contains('A'));
}

#[test]
fn corrupt_startxref_triggers_scan_repair() {
    let mut pdf = single_page_pdf("BT /F1 12 Tf 72 700 Td (Recovered) Tj ET");
    // Break the startxref offset.
    let pos = pdf
        .windows(9)
        .rposition(|w| w == b"startxref")
        .unwrap();
    let digits_at = pos + 10;
    for b in &mut pdf[digits_at..] {
        if b.is_ascii_digit() {
            *b = b'9';
        }
    }

    // Strict mode refuses; permissive mode scans for object headers.
    assert!(PdfDocument::from_bytes(&pdf, strict()).is_err());
    let doc = PdfDocument::from_bytes(&pdf, OpenOptions::default()).unwrap();
    let text = doc.extract_text(None, &Default::default()).unwrap();
    assert!(text.contains("Recovered"));
}

#[test]
fn xref_prev_cycle_is_corruption() {
    let objects = vec![
        obj(1, "<< /Type /Catalog /Pages 2 0 R >>"),
        obj(2, "<< /Type /Pages /Kids [] /Count 0 >>"),
    ];
    // The xref offset does not depend on the trailer contents, so a first
    // build reveals where a self-referential /Prev must point.
    let (_, xref_pos) = build_pdf(&objects, "/Root 1 0 R");
    let (pdf, check) = build_pdf(&objects, &format!("/Root 1 0 R /Prev {}", xref_pos));
    assert_eq!(check, xref_pos);

    match Document::from_bytes(&pdf, strict()) {
        Err(PdfError::XRefCycle(_)) => {}
        other => panic!("expected xref cycle error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn encrypted_documents_are_rejected() {
    let objects = vec![
        obj(1, "<< /Type /Catalog /Pages 2 0 R >>"),
        obj(2, "<< /Type /Pages /Kids [] /Count 0 >>"),
        obj(6, "<< /Filter /Standard /V 2 >>"),
    ];
    let (pdf, _) = build_pdf(&objects, "/Root 1 0 R /Encrypt 6 0 R");
    match Document::from_bytes(&pdf, OpenOptions::default()) {
        Err(PdfError::Encrypted) => {}
        other => panic!("expected Encrypted, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn generation_mismatch_resolves_to_null_in_permissive() {
    let pdf = single_page_pdf("BT /F1 12 Tf (x) Tj ET");

    let doc = Document::from_bytes(&pdf, OpenOptions::default()).unwrap();
    let resolved = doc.resolve_ref(&ObjRef::new(5, 7)).unwrap();
    assert!(resolved.is_null());

    let doc = Document::from_bytes(&pdf, strict()).unwrap();
    assert!(matches!(
        doc.resolve_ref(&ObjRef::new(5, 7)),
        Err(PdfError::GenerationMismatch { objid: 5, .. })
    ));
}

#[test]
fn unknown_object_is_null_in_permissive_error_in_strict() {
    let pdf = single_page_pdf("BT /F1 12 Tf (x) Tj ET");

    let doc = Document::from_bytes(&pdf, OpenOptions::default()).unwrap();
    assert!(doc.resolve_ref(&ObjRef::new(99, 0)).unwrap().is_null());

    let doc = Document::from_bytes(&pdf, strict()).unwrap();
    assert!(matches!(
        doc.resolve_ref(&ObjRef::new(99, 0)),
        Err(PdfError::ObjectNotFound(99))
    ));
}

#[test]
fn xref_stream_and_object_stream_resolve() {
    // Objects 1-3 live inside an object stream; the xref is a stream too.
    let mut pdf = b"%PDF-1.5\n".to_vec();

    // Embedded objects: catalog, pages, page.
    let embedded = concat!(
        "<< /Type /Catalog /Pages 2 0 R >> ",
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >> ",
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
         /Resources << /Font << /F1 5 0 R >> >> /Contents 4 0 R >>"
    );
    let first_off = 0usize;
    let second_off = "<< /Type /Catalog /Pages 2 0 R >> ".len();
    let third_off = second_off + "<< /Type /Pages /Kids [3 0 R] /Count 1 >> ".len();
    let header = format!("1 {} 2 {} 3 {} ", first_off, second_off, third_off);
    let payload = format!("{}{}", header, embedded);

    // Object 6: the object stream.
    let objstm_pos = pdf.len();
    let objstm_body = stream_obj(
        &format!("/Type /ObjStm /N 3 /First {}", header.len()),
        payload.as_bytes(),
    );
    pdf.extend_from_slice(b"6 0 obj\n");
    pdf.extend_from_slice(&objstm_body);
    pdf.extend_from_slice(b"\nendobj\n");

    // Objects 4 and 5: regular content stream and font.
    let content_pos = pdf.len();
    pdf.extend_from_slice(b"4 0 obj\n");
    pdf.extend_from_slice(&stream_obj("", b"BT /F1 12 Tf 72 700 Td (Compressed) Tj ET"));
    pdf.extend_from_slice(b"\nendobj\n");
    let font_pos = pdf.len();
    pdf.extend_from_slice(
        b"5 0 obj\n<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>\nendobj\n",
    );

    // Object 7: the xref stream. W = [1 2 1]; entries for objects 0-7.
    let xref_pos = pdf.len();
    let mut entries: Vec<u8> = Vec::new();
    let mut push_entry = |kind: u8, field1: u16, field2: u8| {
        entries.push(kind);
        entries.extend_from_slice(&field1.to_be_bytes());
        entries.push(field2);
    };
    push_entry(0, 0, 0); // 0: free
    push_entry(2, 6, 0); // 1: objstm 6, index 0
    push_entry(2, 6, 1); // 2: objstm 6, index 1
    push_entry(2, 6, 2); // 3: objstm 6, index 2
    push_entry(1, content_pos as u16, 0); // 4
    push_entry(1, font_pos as u16, 0); // 5
    push_entry(1, objstm_pos as u16, 0); // 6
    push_entry(1, xref_pos as u16, 0); // 7
    let xref_body = stream_obj(
        "/Type /XRef /Size 8 /W [1 2 1] /Index [0 8] /Root 1 0 R",
        &entries,
    );
    pdf.extend_from_slice(b"7 0 obj\n");
    pdf.extend_from_slice(&xref_body);
    pdf.extend_from_slice(b"\nendobj\n");
    pdf.extend_from_slice(format!("startxref\n{}\n%%EOF\n", xref_pos).as_bytes());

    let doc = PdfDocument::from_bytes(&pdf, strict()).unwrap();
    assert_eq!(doc.page_count(), 1);
    let text = doc.extract_text(None, &Default::default()).unwrap();
    assert!(text.contains("Compressed"), "got: {:?}", text);
}

#[test]
fn info_dictionary_is_decoded() {
    let objects = vec![
        obj(1, "<< /Type /Catalog /Pages 2 0 R >>"),
        obj(2, "<< /Type /Pages /Kids [] /Count 0 >>"),
        (
            6,
            b"<< /Title (Annual Report) /Author (\xfe\xff\x00J\x00o) /Producer (tinta) >>".to_vec(),
        ),
    ];
    let (pdf, _) = build_pdf(&objects, "/Root 1 0 R /Info 6 0 R");
    let doc = PdfDocument::from_bytes(&pdf, strict()).unwrap();
    let info = doc.info();
    assert_eq!(info.title.as_deref(), Some("Annual Report"));
    assert_eq!(info.author.as_deref(), Some("Jo"));
    assert_eq!(info.producer.as_deref(), Some("tinta"));
    assert_eq!(info.page_count, 0);
}

#[test]
fn page_info_reports_dimensions_and_rotation() {
    let objects = vec![
        obj(1, "<< /Type /Catalog /Pages 2 0 R >>"),
        obj(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 595 842] >>"),
        obj(3, "<< /Type /Page /Parent 2 0 R /Rotate 90 >>"),
    ];
    let (pdf, _) = build_pdf(&objects, "/Root 1 0 R");
    let doc = PdfDocument::from_bytes(&pdf, strict()).unwrap();
    // MediaBox is inherited from the pages node.
    let info = doc.page_info(0).unwrap();
    assert_eq!(info.width, 595.0);
    assert_eq!(info.height, 842.0);
    assert_eq!(info.rotation, 90);
}

#[test]
fn page_tree_cycle_does_not_hang() {
    let objects = vec![
        obj(1, "<< /Type /Catalog /Pages 2 0 R >>"),
        // Node 2 lists itself as a kid.
        obj(2, "<< /Type /Pages /Kids [2 0 R 3 0 R] /Count 2 >>"),
        obj(3, "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 100 100] >>"),
    ];
    let (pdf, _) = build_pdf(&objects, "/Root 1 0 R");
    let doc = PdfDocument::from_bytes(&pdf, OpenOptions::default()).unwrap();
    assert_eq!(doc.page_count(), 1);
}

#[test]
fn open_maps_a_file_from_disk() {
    use std::io::Write;
    let pdf = single_page_pdf("BT /F1 12 Tf 72 700 Td (mapped) Tj ET");
    let mut tmp = tempfile::NamedTempFile::new().unwrap();
    tmp.write_all(&pdf).unwrap();
    tmp.flush().unwrap();

    let doc = PdfDocument::open(tmp.path(), OpenOptions::default()).unwrap();
    let text = doc.extract_text(None, &Default::default()).unwrap();
    assert!(text.contains("mapped"));
}

#[test]
fn missing_file_surfaces_io_error() {
    match PdfDocument::open("/no/such/file.pdf", OpenOptions::default()) {
        Err(PdfError::Io(_)) => {}
        other => panic!("expected io error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn object_body_roundtrips_through_parser() {
    let pdf = single_page_pdf("BT /F1 12 Tf (x) Tj ET");
    let doc = Document::from_bytes(&pdf, strict()).unwrap();
    let catalog = doc.getobj(1).unwrap();
    let dict = catalog.as_dict().unwrap();
    assert_eq!(dict.get("Type").unwrap(), &Object::Name("Catalog".into()));
}
