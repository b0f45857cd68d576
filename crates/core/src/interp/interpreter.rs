//! The content-stream interpreter.
//!
//! A stack machine over the page's concatenated content streams. The full
//! operator alphabet is recognized; only graphics-state, text, and marked
//! content operators are acted upon. Decoded glyph runs are pushed to a
//! SpanSink as positioned spans.

use super::device::SpanSink;
use crate::document::catalog::Document;
use crate::document::page::Page;
use crate::error::{PdfError, Result};
use crate::font::cmap::Code;
use crate::font::pdffont::Font;
use crate::model::objects::Object;
use crate::model::state::{GraphicsState, TextSpan};
use crate::parser::lexer::Keyword;
use crate::parser::object::{ContentParser, Operation};
use crate::utils::{
    apply_matrix_norm, apply_matrix_pt, mult_matrix, normalize_rect, translate_matrix, Matrix,
    MATRIX_IDENTITY,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Fraction of the font size a positioning change may deviate from the pen
/// position before it breaks the current span.
const CONTIGUITY_RATIO: f64 = 0.1;

/// An in-progress glyph run sharing one font, size, and placement.
struct Run {
    /// CTM x Tm at the start of the run
    matrix: Matrix,
    /// Accumulated x displacement from the run origin, in text space
    disp: f64,
    text: String,
    fontsize: f64,
    rise: f64,
    font_name: Option<String>,
    mcid: Option<u32>,
}

/// Executes one page's content against a span sink.
pub struct PageInterpreter<'a, S: SpanSink> {
    doc: &'a Document,
    page: &'a Page,
    page_index: usize,
    sink: &'a mut S,
    fonts: HashMap<String, Arc<Font>>,
    gs: GraphicsState,
    gs_stack: Vec<GraphicsState>,
    in_text: bool,
    mcid_stack: Vec<Option<u32>>,
    run: Option<Run>,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a, S: SpanSink> PageInterpreter<'a, S> {
    pub fn new(doc: &'a Document, page: &'a Page, page_index: usize, sink: &'a mut S) -> Self {
        Self {
            doc,
            page,
            page_index,
            sink,
            fonts: HashMap::new(),
            gs: GraphicsState::new(MATRIX_IDENTITY),
            gs_stack: Vec::new(),
            in_text: false,
            mcid_stack: Vec::new(),
            run: None,
            cancel: None,
        }
    }

    /// Install a cooperative cancellation flag, checked between operators.
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Execute the page's content streams, joined as one stream.
    pub fn run(&mut self) -> Result<()> {
        let streams = self.page.content_streams(self.doc);
        // The PDF specification requires multiple /Contents streams to
        // behave as a single stream; a whitespace byte keeps operators at
        // the boundaries apart.
        let joined: Vec<u8> = streams.join(&b"\n"[..]);

        let (x0, y0, x1, y1) = (
            self.page.mediabox[0],
            self.page.mediabox[1],
            self.page.mediabox[2],
            self.page.mediabox[3],
        );
        self.sink.begin_page(self.page_index, (x0, y0, x1, y1));

        let mut parser = ContentParser::new(&joined);
        while let Some(op) = parser.next_operation() {
            if let Some(cancel) = &self.cancel {
                if cancel.load(Ordering::Relaxed) {
                    return Err(PdfError::Cancelled);
                }
            }
            self.execute(&op)?;
        }

        self.flush();
        self.sink.end_page(self.page_index);
        Ok(())
    }

    fn strict(&self) -> bool {
        self.doc.mode().is_strict()
    }

    fn execute(&mut self, op: &Operation) -> Result<()> {
        match &op.operator {
            Keyword::Qq => {
                self.gs_stack.push(self.gs.clone());
            }
            Keyword::Q => {
                self.flush();
                match self.gs_stack.pop() {
                    Some(state) => self.gs = state,
                    None if self.strict() => {
                        return Err(PdfError::SyntaxError("Q with empty state stack".into()));
                    }
                    None => log::debug!("Q with empty state stack"),
                }
            }
            Keyword::Cm => {
                if let Some(m) = matrix_operands(&op.operands) {
                    // The run's start matrix bakes in the CTM.
                    self.flush();
                    self.gs.ctm = mult_matrix(m, self.gs.ctm);
                }
            }

            Keyword::BT => {
                if self.in_text {
                    if self.strict() {
                        return Err(PdfError::SyntaxError("nested BT".into()));
                    }
                    log::debug!("nested BT");
                }
                self.flush();
                self.in_text = true;
                self.gs.textstate.reset();
            }
            Keyword::ET => {
                self.flush();
                self.in_text = false;
            }

            Keyword::Tc => {
                if let Some(n) = num_operand(&op.operands, 0) {
                    self.gs.textstate.charspace = n;
                }
            }
            Keyword::Tw => {
                if let Some(n) = num_operand(&op.operands, 0) {
                    self.gs.textstate.wordspace = n;
                }
            }
            Keyword::Tz => {
                if let Some(n) = num_operand(&op.operands, 0) {
                    self.gs.textstate.scaling = n;
                }
            }
            Keyword::TL => {
                if let Some(n) = num_operand(&op.operands, 0) {
                    self.gs.textstate.leading = n;
                }
            }
            Keyword::Tf => {
                let name = op.operands.first().and_then(|o| o.as_name().ok());
                let size = num_operand(&op.operands, 1);
                if let (Some(name), Some(size)) = (name, size) {
                    self.gs.textstate.font = self.load_font(name);
                    self.gs.textstate.fontsize = size;
                }
            }
            Keyword::Tr => {
                if let Some(n) = num_operand(&op.operands, 0) {
                    self.gs.textstate.render = n as i32;
                }
            }
            Keyword::Ts => {
                if let Some(n) = num_operand(&op.operands, 0) {
                    self.gs.textstate.rise = n;
                }
            }

            Keyword::Td => {
                if let (Some(tx), Some(ty)) = (num_operand(&op.operands, 0), num_operand(&op.operands, 1)) {
                    self.text_newline(tx, ty);
                }
            }
            Keyword::TD => {
                if let (Some(tx), Some(ty)) = (num_operand(&op.operands, 0), num_operand(&op.operands, 1)) {
                    self.gs.textstate.leading = -ty;
                    self.text_newline(tx, ty);
                }
            }
            Keyword::Tm => {
                if let Some(m) = matrix_operands(&op.operands) {
                    self.maybe_break(m);
                    self.gs.textstate.linematrix = m;
                    self.gs.textstate.matrix = m;
                }
            }
            Keyword::TStar => {
                let leading = self.gs.textstate.leading;
                self.text_newline(0.0, -leading);
            }

            Keyword::Tj => {
                if let Some(Object::String(s)) = op.operands.first() {
                    self.show_string(s);
                }
            }
            Keyword::TJ => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    for item in items {
                        match item {
                            Object::String(s) => self.show_string(s),
                            Object::Int(_) | Object::Real(_) => {
                                // Thousandths of an em, subtracted from the
                                // x displacement.
                                let n = item.as_num().unwrap_or(0.0);
                                let ts = &self.gs.textstate;
                                let tx = -n / 1000.0 * ts.fontsize * ts.scaling / 100.0;
                                let moved = translate_matrix(ts.matrix, (tx, 0.0));
                                self.maybe_break(moved);
                                self.gs.textstate.matrix = moved;
                            }
                            _ => {}
                        }
                    }
                }
            }
            Keyword::Quote => {
                let leading = self.gs.textstate.leading;
                self.text_newline(0.0, -leading);
                if let Some(Object::String(s)) = op.operands.first() {
                    self.show_string(s);
                }
            }
            Keyword::DoubleQuote => {
                if let (Some(aw), Some(ac)) = (num_operand(&op.operands, 0), num_operand(&op.operands, 1)) {
                    self.gs.textstate.wordspace = aw;
                    self.gs.textstate.charspace = ac;
                }
                let leading = self.gs.textstate.leading;
                self.text_newline(0.0, -leading);
                if let Some(Object::String(s)) = op.operands.get(2) {
                    self.show_string(s);
                }
            }

            Keyword::BMC => {
                self.push_marked_content(None);
            }
            Keyword::BDC => {
                let mcid = op.operands.get(1).and_then(|props| match props {
                    Object::Dict(dict) => dict
                        .get("MCID")
                        .and_then(|m| m.as_int().ok())
                        .and_then(|m| u32::try_from(m).ok()),
                    // A name refers into /Properties; those carry no MCID
                    // worth chasing for text extraction.
                    _ => None,
                });
                self.push_marked_content(mcid);
            }
            Keyword::EMC => {
                if self.mcid_stack.pop().is_none() {
                    log::debug!("EMC without matching BMC/BDC");
                }
                if self.current_mcid() != self.run.as_ref().and_then(|r| r.mcid) {
                    self.flush();
                }
            }

            // Recognized but irrelevant to text extraction.
            _ => {}
        }
        Ok(())
    }

    fn push_marked_content(&mut self, mcid: Option<u32>) {
        // Inherit the enclosing MCID when the new block carries none.
        let effective = mcid.or_else(|| self.current_mcid());
        if effective != self.run.as_ref().and_then(|r| r.mcid) {
            self.flush();
        }
        self.mcid_stack.push(effective);
    }

    fn current_mcid(&self) -> Option<u32> {
        self.mcid_stack.last().copied().flatten()
    }

    /// Td and friends: translate the line matrix, reset the text matrix.
    fn text_newline(&mut self, tx: f64, ty: f64) {
        let moved = translate_matrix(self.gs.textstate.linematrix, (tx, ty));
        self.maybe_break(moved);
        self.gs.textstate.linematrix = moved;
        self.gs.textstate.matrix = moved;
    }

    /// Break the current run unless the new text matrix stays within one
    /// tenth of an em of where the pen would have landed. A surviving shift
    /// (TJ kerning) is folded into the run's displacement.
    fn maybe_break(&mut self, new_tm: Matrix) {
        if self.run.is_none() {
            return;
        }
        let ts = &self.gs.textstate;
        let old = ts.matrix;
        let de = new_tm.4 - old.4;
        let df = new_tm.5 - old.5;
        let (ax, ay) = (old.0, old.1);
        let axis_sq = (ax * ax + ay * ay).max(1e-12);
        let tolerance = CONTIGUITY_RATIO * ts.fontsize.max(1e-6) * axis_sq.sqrt();
        if (de * de + df * df).sqrt() > tolerance
            || new_tm.0 != old.0
            || new_tm.1 != old.1
            || new_tm.2 != old.2
            || new_tm.3 != old.3
        {
            self.flush();
        } else if let Some(run) = &mut self.run {
            run.disp += (de * ax + df * ay) / axis_sq;
        }
    }

    fn load_font(&mut self, name: &str) -> Option<Arc<Font>> {
        if let Some(font) = self.fonts.get(name) {
            return Some(Arc::clone(font));
        }
        let font_res = self.doc.dict_get(&self.page.resources, "Font")?;
        let font_dicts = font_res.as_dict().ok()?;
        let font_dict = self.doc.dict_get(font_dicts, name)?;
        let font_dict = font_dict.as_dict().ok()?;
        match Font::load(self.doc, font_dict) {
            Ok(font) => {
                let font = Arc::new(font);
                self.fonts.insert(name.to_string(), Arc::clone(&font));
                Some(font)
            }
            Err(e) => {
                log::warn!("font {} failed to load: {}", name, e);
                None
            }
        }
    }

    /// Decode and place one show-string, advancing the text matrix.
    fn show_string(&mut self, bytes: &[u8]) {
        let Some(font) = self.gs.textstate.font.clone() else {
            log::debug!("show string with no font set");
            return;
        };
        if !self.in_text {
            log::debug!("show string outside BT/ET");
        }

        let mcid = self.current_mcid();
        for code in font.decode(bytes) {
            let text = font.to_unicode(code);
            let advance = self.advance_for(&font, code);
            self.append_glyph(&text, advance, mcid);
        }
    }

    /// Glyph advance in text-space units.
    fn advance_for(&self, font: &Font, code: Code) -> f64 {
        let ts = &self.gs.textstate;
        let mut advance = font.char_width(code) / 1000.0 * ts.fontsize + ts.charspace;
        // Word spacing applies to the single-byte code 32.
        if code == (1, 32) {
            advance += ts.wordspace;
        }
        advance * ts.scaling / 100.0
    }

    fn append_glyph(&mut self, text: &str, advance: f64, mcid: Option<u32>) {
        let ts = &self.gs.textstate;
        let fontsize = ts.fontsize;
        let font_name = ts.font.as_ref().and_then(|f| f.name.clone());

        let needs_new = match &self.run {
            None => true,
            Some(run) => {
                run.fontsize != fontsize || run.font_name != font_name || run.mcid != mcid
            }
        };
        if needs_new {
            self.flush();
            let ts = &self.gs.textstate;
            self.run = Some(Run {
                matrix: mult_matrix(ts.matrix, self.gs.ctm),
                disp: 0.0,
                text: String::new(),
                fontsize,
                rise: ts.rise,
                font_name,
                mcid,
            });
        }

        if let Some(run) = &mut self.run {
            run.text.push_str(text);
            run.disp += advance;
        }
        let tm = translate_matrix(self.gs.textstate.matrix, (advance, 0.0));
        self.gs.textstate.matrix = tm;
    }

    /// Emit the current run as a span.
    fn flush(&mut self) {
        let Some(run) = self.run.take() else { return };
        if run.text.is_empty() {
            return;
        }

        // Device corners of (0, 0) and (disp, size), rise included.
        let p0 = apply_matrix_pt(run.matrix, (0.0, run.rise));
        let p1 = apply_matrix_pt(run.matrix, (run.disp, run.fontsize + run.rise));
        let bbox = normalize_rect((p0.0, p0.1, p1.0, p1.1));

        let (vx, vy) = apply_matrix_norm(run.matrix, (0.0, run.fontsize));
        let device_size = (vx * vx + vy * vy).sqrt();

        self.sink.span(TextSpan {
            text: run.text,
            font_size: device_size,
            font_name: run.font_name,
            bbox,
            mcid: run.mcid,
        });
    }
}

fn num_operand(operands: &[Object], index: usize) -> Option<f64> {
    operands.get(index).and_then(|o| o.as_num().ok())
}

fn matrix_operands(operands: &[Object]) -> Option<Matrix> {
    if operands.len() < 6 {
        return None;
    }
    Some((
        num_operand(operands, 0)?,
        num_operand(operands, 1)?,
        num_operand(operands, 2)?,
        num_operand(operands, 3)?,
        num_operand(operands, 4)?,
        num_operand(operands, 5)?,
    ))
}
