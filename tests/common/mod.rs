//! In-memory PDF fixtures, shared by unit tests (as `crate::testing`),
//! integration tests and benches

#![allow(dead_code)]

/// Build a letter-size PDF whose pages carry the given explicit /Rotate
/// values (`None` leaves the key out). `tree_rotate` sets an inheritable
/// /Rotate on the page tree root.
pub fn pdf_with_rotations(rotations: &[Option<i64>], tree_rotate: Option<i64>) -> Vec<u8> {
    let mut objects = vec!["<< /Type /Catalog /Pages 2 0 R >>".to_string()];

    let kids = (0..rotations.len())
        .map(|i| format!("{} 0 R", i + 3))
        .collect::<Vec<_>>()
        .join(" ");
    let inherited = tree_rotate
        .map(|r| format!(" /Rotate {}", r))
        .unwrap_or_default();
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {}{} >>",
        kids,
        rotations.len(),
        inherited
    ));

    for rotate in rotations {
        let rotate = rotate.map(|r| format!(" /Rotate {}", r)).unwrap_or_default();
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Resources << >>{} >>",
            rotate
        ));
    }

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, object) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, object).as_bytes());
    }

    let xref = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref
        )
        .as_bytes(),
    );
    out
}

/// A PDF with `pages` unrotated blank pages
pub fn blank_pdf(pages: usize) -> Vec<u8> {
    pdf_with_rotations(&vec![None; pages], None)
}

/// A PDF whose page `i` is rotated by `(i % 4) * 90`, so page order is
/// observable through rotations alone.
pub fn tagged_pdf(pages: usize) -> Vec<u8> {
    let rotations: Vec<Option<i64>> = (0..pages).map(|i| Some((i as i64 % 4) * 90)).collect();
    pdf_with_rotations(&rotations, None)
}
