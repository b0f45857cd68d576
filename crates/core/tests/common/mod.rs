//! Shared helpers: build minimal PDFs in memory.
#![allow(dead_code)]

use std::collections::BTreeMap;

/// An indirect object body, without the `N 0 obj` / `endobj` wrapper.
pub type ObjSpec = (u32, Vec<u8>);

pub fn obj(id: u32, body: &str) -> ObjSpec {
    (id, body.as_bytes().to_vec())
}

/// A stream object body with a correct /Length.
pub fn stream_obj(dict_extra: &str, data: &[u8]) -> Vec<u8> {
    let mut out = format!("<< /Length {} {} >>\nstream\n", data.len(), dict_extra).into_bytes();
    out.extend_from_slice(data);
    out.extend_from_slice(b"\nendstream");
    out
}

/// Assemble a one-revision PDF with a classic xref table.
///
/// Returns the file bytes and the xref offset (useful as /Prev for an
/// appended revision).
pub fn build_pdf(objects: &[ObjSpec], trailer_extra: &str) -> (Vec<u8>, usize) {
    let mut out = b"%PDF-1.4\n%\xc2\xa5\xc2\xb1\xc3\xab\n".to_vec();

    let mut offsets: BTreeMap<u32, usize> = BTreeMap::new();
    for (id, body) in objects {
        offsets.insert(*id, out.len());
        out.extend_from_slice(format!("{} 0 obj\n", id).as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
    }

    let max_id = offsets.keys().copied().max().unwrap_or(0);
    let size = max_id + 1;
    let xref_pos = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", size).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for id in 1..=max_id {
        match offsets.get(&id) {
            Some(offset) => {
                out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
            }
            None => out.extend_from_slice(b"0000000000 65535 f \n"),
        }
    }
    out.extend_from_slice(
        format!("trailer\n<< /Size {} {} >>\nstartxref\n{}\n%%EOF\n", size, trailer_extra, xref_pos)
            .as_bytes(),
    );

    (out, xref_pos)
}

/// Append an incremental revision with its own xref table and /Prev link.
pub fn append_revision(
    pdf: &mut Vec<u8>,
    objects: &[ObjSpec],
    prev_xref: usize,
    trailer_extra: &str,
) -> usize {
    let mut offsets: BTreeMap<u32, usize> = BTreeMap::new();
    for (id, body) in objects {
        offsets.insert(*id, pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n", id).as_bytes());
        pdf.extend_from_slice(body);
        pdf.extend_from_slice(b"\nendobj\n");
    }

    let size = offsets.keys().copied().max().unwrap_or(0) + 1;
    let xref_pos = pdf.len();
    pdf.extend_from_slice(b"xref\n");
    for (id, offset) in &offsets {
        pdf.extend_from_slice(format!("{} 1\n{:010} 00000 n \n", id, offset).as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Prev {} {} >>\nstartxref\n{}\n%%EOF\n",
            size, prev_xref, trailer_extra, xref_pos
        )
        .as_bytes(),
    );
    xref_pos
}

/// A single-page document showing `content` through a Helvetica Type1 font.
pub fn single_page_pdf(content: &str) -> Vec<u8> {
    multi_page_pdf(&[content])
}

/// One catalog with one page per content stream.
pub fn multi_page_pdf(contents: &[&str]) -> Vec<u8> {
    let n = contents.len() as u32;
    let mut objects = vec![
        obj(1, "<< /Type /Catalog /Pages 2 0 R >>"),
        obj(
            2,
            &format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                (0..n).map(|i| format!("{} 0 R", 3 + 2 * i)).collect::<Vec<_>>().join(" "),
                n
            ),
        ),
    ];
    for (i, content) in contents.iter().enumerate() {
        let page_id = 3 + 2 * i as u32;
        let content_id = page_id + 1;
        objects.push(obj(
            page_id,
            &format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
                 /Resources << /Font << /F1 {} 0 R >> >> /Contents {} 0 R >>",
                3 + 2 * n, content_id
            ),
        ));
        objects.push((content_id, stream_obj("", content.as_bytes())));
    }
    objects.push(obj(
        3 + 2 * n,
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>",
    ));

    build_pdf(&objects, "/Root 1 0 R").0
}
