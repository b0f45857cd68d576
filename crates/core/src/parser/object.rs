//! PDF object parser - builds object trees from tokens.
//!
//! Handles indirect references (`num num R`) with one token of pushback,
//! nested arrays and dictionaries, and the operand/operator stream of page
//! content. Stream objects are assembled at the document layer, which has
//! xref access for indirect /Length values.

use crate::error::{PdfError, Result};
use crate::model::objects::{ObjRef, Object};
use crate::parser::lexer::{is_whitespace, Keyword, Lexer, Token};
use std::collections::HashMap;

/// Parses PDF object syntax from a byte slice.
pub struct ObjectParser<'a> {
    lexer: Lexer<'a>,
    /// Pushback buffer for the `int int R` lookahead
    lookahead: Vec<Token>,
}

impl<'a> ObjectParser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            lexer: Lexer::new(data),
            lookahead: Vec::new(),
        }
    }

    /// Byte position of the cursor (past any lookahead tokens).
    pub fn tell(&self) -> usize {
        self.lexer.tell()
    }

    /// Remaining unparsed bytes.
    pub fn remaining(&self) -> &'a [u8] {
        self.lexer.remaining()
    }

    fn next_token(&mut self) -> Result<Option<Token>> {
        if let Some(tok) = self.lookahead.pop() {
            return Ok(Some(tok));
        }
        match self.lexer.next_token() {
            Some(Ok((_, tok))) => Ok(Some(tok)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    fn push_back(&mut self, tok: Token) {
        self.lookahead.push(tok);
    }

    /// Parse the next PDF object.
    pub fn parse_object(&mut self) -> Result<Object> {
        let token = self.next_token()?.ok_or(PdfError::UnexpectedEof)?;
        self.token_to_object(token)
    }

    /// Consume one expected keyword; errors if the next token differs.
    pub fn expect_keyword(&mut self, want: &Keyword) -> Result<()> {
        let token = self.next_token()?.ok_or(PdfError::UnexpectedEof)?;
        match token {
            Token::Keyword(ref kw) if kw == want => Ok(()),
            other => Err(PdfError::TokenError {
                pos: self.lexer.tell(),
                msg: format!("expected {:?}, got {:?}", want, other),
            }),
        }
    }

    /// Peek at the next token without consuming it.
    pub fn peek_token(&mut self) -> Result<Option<Token>> {
        let tok = self.next_token()?;
        if let Some(t) = tok.clone() {
            self.push_back(t);
        }
        Ok(tok)
    }

    fn token_to_object(&mut self, token: Token) -> Result<Object> {
        match token {
            Token::Int(n) => {
                // Could be the start of an indirect reference: objid genno R
                if let Ok(Some(tok2)) = self.next_token() {
                    if let Token::Int(m) = tok2 {
                        if let Ok(Some(tok3)) = self.next_token() {
                            if tok3 == Token::Keyword(Keyword::R) && n >= 0 && m >= 0 {
                                return Ok(Object::Ref(ObjRef::new(n as u32, m as u32)));
                            }
                            self.push_back(tok3);
                        }
                        self.push_back(Token::Int(m));
                    } else {
                        self.push_back(tok2);
                    }
                }
                Ok(Object::Int(n))
            }
            Token::Real(n) => Ok(Object::Real(n)),
            Token::Name(s) => Ok(Object::Name(s)),
            Token::String(s) => Ok(Object::String(s)),
            Token::Keyword(kw) => match kw {
                Keyword::Null => Ok(Object::Null),
                Keyword::True => Ok(Object::Bool(true)),
                Keyword::False => Ok(Object::Bool(false)),
                Keyword::ArrayStart => self.parse_array(),
                Keyword::DictStart => self.parse_dict(),
                other => Err(PdfError::TokenError {
                    pos: self.lexer.tell(),
                    msg: format!("unexpected keyword in object: {:?}", other),
                }),
            },
        }
    }

    /// Parse array contents until `]`.
    fn parse_array(&mut self) -> Result<Object> {
        let mut arr = Vec::new();
        loop {
            let token = self.next_token()?.ok_or(PdfError::UnexpectedEof)?;
            if token == Token::Keyword(Keyword::ArrayEnd) {
                break;
            }
            arr.push(self.token_to_object(token)?);
        }
        Ok(Object::Array(arr))
    }

    /// Parse dict contents until `>>`. Keys must be names.
    fn parse_dict(&mut self) -> Result<Object> {
        let mut dict = HashMap::new();
        loop {
            let token = self.next_token()?.ok_or(PdfError::UnexpectedEof)?;
            if token == Token::Keyword(Keyword::DictEnd) {
                break;
            }
            let key = match token {
                Token::Name(name) => name,
                _ => {
                    return Err(PdfError::TokenError {
                        pos: self.lexer.tell(),
                        msg: "expected name as dict key".into(),
                    });
                }
            };
            let value = self.parse_object()?;
            dict.insert(key, value);
        }
        Ok(Object::Dict(dict))
    }
}

/// One content-stream operation: an operator and its operands.
#[derive(Debug, Clone)]
pub struct Operation {
    pub operator: Keyword,
    pub operands: Vec<Object>,
}

/// Parses a page content stream into a sequence of operations.
///
/// Operands accumulate until an operator token flushes them. Inline images
/// (BI ... ID <binary> EI) are consumed and skipped: image extraction is out
/// of scope, but their binary payload must not be tokenized.
pub struct ContentParser<'a> {
    lexer: Lexer<'a>,
    operands: Vec<Object>,
    /// Saved operand frames for nested array/dict construction
    context: Vec<Vec<Object>>,
}

impl<'a> ContentParser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            lexer: Lexer::new(data),
            operands: Vec::new(),
            context: Vec::new(),
        }
    }

    /// Produce the next operation, or None at end of stream.
    ///
    /// Tokens that cannot be interpreted are dropped; content parsing is
    /// always permissive because one bad operand must not lose the page.
    pub fn next_operation(&mut self) -> Option<Operation> {
        while let Some(result) = self.lexer.next_token() {
            let token = match result {
                Ok((_, tok)) => tok,
                Err(_) => continue,
            };

            match token {
                Token::Keyword(Keyword::ArrayStart) | Token::Keyword(Keyword::DictStart) => {
                    self.context.push(std::mem::take(&mut self.operands));
                }
                Token::Keyword(Keyword::ArrayEnd) => {
                    let contents = std::mem::take(&mut self.operands);
                    self.operands = self.context.pop().unwrap_or_default();
                    self.operands.push(Object::Array(contents));
                }
                Token::Keyword(Keyword::DictEnd) => {
                    let contents = std::mem::take(&mut self.operands);
                    self.operands = self.context.pop().unwrap_or_default();
                    self.operands.push(Object::Dict(pairs_to_dict(contents)));
                }
                Token::Keyword(Keyword::BI) => {
                    self.skip_inline_image();
                    self.operands.clear();
                }
                Token::Keyword(kw) => {
                    let operands = std::mem::take(&mut self.operands);
                    return Some(Operation {
                        operator: kw,
                        operands,
                    });
                }
                Token::Int(n) => self.operands.push(Object::Int(n)),
                Token::Real(n) => self.operands.push(Object::Real(n)),
                Token::Name(s) => self.operands.push(Object::Name(s)),
                Token::String(s) => self.operands.push(Object::String(s)),
            }
        }
        None
    }

    /// Skip an inline image: tokens up to ID, then raw bytes until a
    /// whitespace-delimited EI.
    fn skip_inline_image(&mut self) {
        while let Some(result) = self.lexer.next_token() {
            match result {
                Ok((_, Token::Keyword(Keyword::ID))) => break,
                Ok(_) => {}
                Err(_) => return,
            }
        }
        // One whitespace byte separates ID from the image data.
        let data = self.lexer.remaining();
        let mut start = 0;
        if start < data.len() && is_whitespace(data[start]) {
            start += 1;
        }
        let mut i = start;
        while i + 1 < data.len() {
            if data[i] == b'E'
                && data[i + 1] == b'I'
                && (i == 0 || is_whitespace(data[i - 1]))
                && (i + 2 >= data.len() || is_whitespace(data[i + 2]) || is_delim_at(data, i + 2))
            {
                self.lexer.set_pos(self.lexer.tell() + i + 2);
                return;
            }
            i += 1;
        }
        self.lexer.set_pos(self.lexer.tell() + data.len());
    }
}

fn is_delim_at(data: &[u8], i: usize) -> bool {
    data.get(i).copied().is_some_and(crate::parser::lexer::is_delimiter)
}

/// Fold a flat key/value object sequence into a dictionary.
fn pairs_to_dict(contents: Vec<Object>) -> HashMap<String, Object> {
    let mut dict = HashMap::new();
    let mut iter = contents.into_iter();
    while let Some(key) = iter.next() {
        if let Object::Name(name) = key {
            if let Some(value) = iter.next() {
                dict.insert(name, value);
            }
        }
    }
    dict
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_indirect_reference() {
        let mut parser = ObjectParser::new(b"5 0 R");
        assert_eq!(
            parser.parse_object().unwrap(),
            Object::Ref(ObjRef::new(5, 0))
        );
    }

    #[test]
    fn two_ints_are_not_a_reference() {
        let mut parser = ObjectParser::new(b"5 0 7");
        assert_eq!(parser.parse_object().unwrap(), Object::Int(5));
        assert_eq!(parser.parse_object().unwrap(), Object::Int(0));
        assert_eq!(parser.parse_object().unwrap(), Object::Int(7));
    }

    #[test]
    fn parses_nested_dict() {
        let mut parser =
            ObjectParser::new(b"<< /Type /Page /MediaBox [0 0 612 792] /Parent 2 0 R >>");
        let obj = parser.parse_object().unwrap();
        let dict = obj.as_dict().unwrap();
        assert_eq!(dict.get("Type").unwrap().as_name().unwrap(), "Page");
        let mb = dict.get("MediaBox").unwrap().as_array().unwrap();
        assert_eq!(mb.len(), 4);
        assert_eq!(
            dict.get("Parent").unwrap(),
            &Object::Ref(ObjRef::new(2, 0))
        );
    }

    #[test]
    fn dict_with_non_name_key_is_an_error() {
        let mut parser = ObjectParser::new(b"<< 1 2 >>");
        assert!(parser.parse_object().is_err());
    }

    #[test]
    fn content_operations_accumulate_operands() {
        let mut parser = ContentParser::new(b"BT /F1 12 Tf 72 700 Td (Hi) Tj ET");
        let ops: Vec<Operation> = std::iter::from_fn(|| parser.next_operation()).collect();
        let names: Vec<&Keyword> = ops.iter().map(|op| &op.operator).collect();
        assert_eq!(
            names,
            vec![
                &Keyword::BT,
                &Keyword::Tf,
                &Keyword::Td,
                &Keyword::Tj,
                &Keyword::ET
            ]
        );
        assert_eq!(ops[1].operands.len(), 2);
        assert_eq!(ops[3].operands, vec![Object::String(b"Hi".to_vec())]);
    }

    #[test]
    fn tj_array_with_offsets() {
        let mut parser = ContentParser::new(b"[(A) -120 (B)] TJ");
        let op = parser.next_operation().unwrap();
        assert_eq!(op.operator, Keyword::TJ);
        let arr = op.operands[0].as_array().unwrap();
        assert_eq!(arr.len(), 3);
    }

    #[test]
    fn inline_image_is_skipped() {
        let data = b"q BI /W 1 /H 1 ID \x00\xff\x12 EI Q BT ET";
        let mut parser = ContentParser::new(data);
        let ops: Vec<Keyword> =
            std::iter::from_fn(|| parser.next_operation()).map(|op| op.operator).collect();
        assert_eq!(
            ops,
            vec![Keyword::Qq, Keyword::Q, Keyword::BT, Keyword::ET]
        );
    }
}
