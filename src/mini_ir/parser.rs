//! Parses one IR source into a `TranslationUnit` and runs the two
//! intra-unit passes: local label solving and local sizeof solving.

use std::collections::{HashMap, HashSet};

use miette::{SourceOffset, SourceSpan};

use crate::mini_front::error::{
    InvalidTokenError, SyntaxError, UnexpectedTokenError, UnsupportedOffsetRegisterError,
};
use crate::mini_front::lexer::token::{Token, TokenKind};
use crate::mini_front::lexer::Lexer;
use crate::mini_front::node::{expand, Node};
use crate::mini_ir::error::{ConstantNotFoundError, CyclicSizeofError, IrError, LinkError};
use crate::mini_ir::{ConstData, Constant, DataMode, TranslationUnit};
use crate::mini_vm::code::{Offset, Opcode, Register};
use crate::utils::Span;

/// Tokenizes and parses one IR source, with labels and sizeof references
/// already solved where the unit itself can solve them.
pub fn parse(source: &str) -> Result<TranslationUnit, IrError> {
    let tokens = Lexer::new(source)
        .tokenize()
        .map_err(|(kind, span)| SyntaxError::from(InvalidTokenError::new(kind, span, source)))?;
    Parser::new(tokens, source.to_string()).parse_unit()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    src: String,
}

impl Parser {
    fn new(tokens: Vec<Token>, src: String) -> Self {
        Self {
            tokens: crate::mini_asm::remove_comments(tokens),
            pos: 0,
            src,
        }
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn source_span(&self, span: Span) -> SourceSpan {
        SourceSpan::new(SourceOffset::from(span.start), span.len())
    }

    fn unexpected(&self, expected: &str) -> SyntaxError {
        let token = self.current().clone();
        let span = self.source_span(token.span());
        SyntaxError::UnexpectedToken(UnexpectedTokenError {
            expected: expected.to_string(),
            token,
            span,
            src: self.src.clone(),
        })
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token, SyntaxError> {
        if *self.current().kind() == kind {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.current().kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume_ident(&mut self, name: &str) -> bool {
        if matches!(self.current().kind(), TokenKind::Identifier(id) if id == name) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_identifier(&mut self) -> Result<(String, Span), SyntaxError> {
        match self.current().kind() {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                let span = self.current().span();
                self.advance();
                Ok((name, span))
            }
            _ => Err(self.unexpected("an identifier")),
        }
    }

    fn expect_integer(&mut self) -> Result<i64, SyntaxError> {
        match self.current().kind() {
            TokenKind::Integer(value) => {
                let value = *value;
                self.advance();
                Ok(value)
            }
            _ => Err(self.unexpected("an integer")),
        }
    }

    fn parse_unit(&mut self) -> Result<TranslationUnit, IrError> {
        let mut unit = TranslationUnit::default();
        loop {
            match self.current().kind() {
                TokenKind::Eof => break,
                TokenKind::Dot => {
                    self.advance();
                    self.parse_directive(&mut unit)?;
                }
                _ => {
                    let text = self.parse_text()?;
                    let mut excluded = unit.exports.clone();
                    if let Some(entry) = &unit.entry_point {
                        excluded.push(entry.clone());
                    }
                    let (text, _) = solve_labels(&excluded, expand(text));
                    let (constants, text) =
                        solve_sizeof(&unit.imports, &unit.constants, text)?;
                    unit.constants = constants;
                    unit.text = text;
                }
            }
        }
        Ok(unit)
    }

    fn parse_directive(&mut self, unit: &mut TranslationUnit) -> Result<(), SyntaxError> {
        if self.consume_ident("import") {
            let (name, _) = self.expect_identifier()?;
            unit.imports.push(name);
            return Ok(());
        }
        if self.consume_ident("export") {
            let (name, _) = self.expect_identifier()?;
            unit.exports.push(name);
            return Ok(());
        }
        if self.consume_ident("section") {
            self.expect(TokenKind::Dot, "'.'")?;
            if self.consume_ident("data") {
                self.expect(TokenKind::Colon, "':'")?;
                unit.constants = self.parse_constants()?;
                return Ok(());
            }
            if self.consume_ident("text") {
                self.expect(TokenKind::Colon, "':'")?;
                unit.entry_point = self.parse_entry_point()?;
                return Ok(());
            }
            return Err(self.unexpected("'data' or 'text'"));
        }
        Err(self.unexpected("'import', 'export' or 'section'"))
    }

    fn parse_constants(&mut self) -> Result<Vec<Constant>, SyntaxError> {
        let mut constants = Vec::new();
        while let TokenKind::Identifier(name) = self.current().kind() {
            let name = name.clone();
            self.advance();
            if self.consume_ident("auto") {
                let values = self.parse_array()?;
                constants.push(Constant::auto(name, values));
            } else if self.consume_ident("sizeof") {
                let (reference, _) = self.expect_identifier()?;
                constants.push(Constant::sizeof(name, reference));
            } else {
                return Err(self.unexpected("'auto' or 'sizeof'"));
            }
        }
        Ok(constants)
    }

    /// `"str"` becomes one character constant per scalar; otherwise a
    /// comma-separated list of integer and character literals.
    fn parse_array(&mut self) -> Result<Vec<ConstData>, SyntaxError> {
        if let TokenKind::StringLiteral(text) = self.current().kind() {
            let values = text.chars().map(ConstData::Char).collect();
            self.advance();
            return Ok(values);
        }
        let mut values = Vec::new();
        loop {
            match self.current().kind() {
                TokenKind::Integer(v) => {
                    values.push(ConstData::Int(*v));
                    self.advance();
                }
                TokenKind::Char(c) => {
                    values.push(ConstData::Char(*c));
                    self.advance();
                }
                _ => return Err(self.unexpected("an integer, character or string literal")),
            }
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }
        Ok(values)
    }

    fn parse_entry_point(&mut self) -> Result<Option<String>, SyntaxError> {
        if self.consume_ident("global") {
            let (name, _) = self.expect_identifier()?;
            return Ok(Some(name));
        }
        Ok(None)
    }

    fn parse_text(&mut self) -> Result<Vec<Node>, SyntaxError> {
        let mut nodes = Vec::new();
        loop {
            match self.current().kind() {
                TokenKind::Eof => break,
                TokenKind::Identifier(_) => nodes.push(self.parse_identifier()?),
                TokenKind::Integer(value) => {
                    nodes.push(Node::Int(*value));
                    self.advance();
                }
                TokenKind::Char(c) => {
                    nodes.push(Node::Char(*c));
                    self.advance();
                }
                TokenKind::LParen => nodes.push(self.parse_pc_offset()?),
                TokenKind::LBracket => nodes.push(self.parse_stack_offset()?),
                _ => return Err(self.unexpected("an instruction, operand or label")),
            }
        }
        Ok(nodes)
    }

    /// Opcode first, register second, and anything else is a label
    /// occurrence: defining with a trailing colon, referencing without.
    fn parse_identifier(&mut self) -> Result<Node, SyntaxError> {
        let (name, _) = self.expect_identifier()?;
        if let Some(op) = Opcode::from_mnemonic(&name) {
            return Ok(Node::Op(op));
        }
        if let Some(reg) = Register::from_name(&name) {
            return Ok(Node::Reg(reg));
        }
        let define = self.consume(&TokenKind::Colon);
        Ok(Node::Label { define, name })
    }

    fn parse_pc_offset(&mut self) -> Result<Node, SyntaxError> {
        self.expect(TokenKind::LParen, "'('")?;
        let negative = if self.consume(&TokenKind::Minus) {
            true
        } else {
            self.consume(&TokenKind::Plus);
            false
        };
        let value = self.expect_integer()?;
        self.expect(TokenKind::RParen, "')'")?;
        let diff = if negative { -value } else { value };
        Ok(Node::Off(Offset::Pc(diff)))
    }

    fn parse_stack_offset(&mut self) -> Result<Node, SyntaxError> {
        self.expect(TokenKind::LBracket, "'['")?;
        let (name, span) = self.expect_identifier()?;
        let negative = if self.consume(&TokenKind::Minus) {
            true
        } else {
            self.consume(&TokenKind::Plus);
            false
        };
        let value = self.expect_integer()?;
        self.expect(TokenKind::RBracket, "']'")?;
        let diff = if negative { -value } else { value };
        match name.as_str() {
            "sp" => Ok(Node::Off(Offset::Sp(diff))),
            "bp" => Ok(Node::Off(Offset::Bp(diff))),
            _ => Err(SyntaxError::UnsupportedOffsetRegister(
                UnsupportedOffsetRegisterError {
                    span: self.source_span(span),
                    name,
                    src: self.src.clone(),
                },
            )),
        }
    }
}

/// Replaces internal defining labels with `nop`, recording their node
/// index, then rewrites references to them as PC offsets. The offset is
/// anchored one cell back, at the opcode that owns the operand. Names in
/// `excluded` stay symbolic for the linker.
pub(crate) fn solve_labels(
    excluded: &[String],
    nodes: Vec<Node>,
) -> (Vec<Node>, HashMap<String, usize>) {
    let mut locations: HashMap<String, usize> = HashMap::new();
    let mut defined = Vec::with_capacity(nodes.len());
    for (pc, node) in nodes.into_iter().enumerate() {
        match node {
            Node::Label {
                define: true,
                ref name,
            } if !excluded.contains(name) => {
                locations.insert(name.clone(), pc);
                defined.push(Node::Op(Opcode::Nop));
            }
            other => defined.push(other),
        }
    }

    let mut result = Vec::with_capacity(defined.len());
    for (pc, node) in defined.into_iter().enumerate() {
        match node {
            Node::Label {
                define: false,
                ref name,
            } if locations.contains_key(name) => {
                let target = locations[name] as i64;
                result.push(Node::Off(Offset::Pc(target - (pc as i64 - 1))));
            }
            other => result.push(other),
        }
    }
    (result, locations)
}

/// Substitutes references to SIZEOF constants with the referent's length,
/// following SIZEOF chains recursively. Substituted constants are dropped
/// from the constant list; AUTO constants survive for the linker.
pub(crate) fn solve_sizeof(
    imports: &[String],
    constants: &[Constant],
    nodes: Vec<Node>,
) -> Result<(Vec<Constant>, Vec<Node>), LinkError> {
    let cmap: HashMap<&str, &Constant> =
        constants.iter().map(|c| (c.name.as_str(), c)).collect();

    fn size_of(
        name: &str,
        cmap: &HashMap<&str, &Constant>,
        visited: &mut HashSet<String>,
    ) -> Result<i64, LinkError> {
        if visited.contains(name) {
            return Err(CyclicSizeofError {
                name: name.to_string(),
            }
            .into());
        }
        let constant = cmap.get(name).ok_or_else(|| ConstantNotFoundError {
            name: name.to_string(),
        })?;
        visited.insert(name.to_string());
        let size = match constant.mode {
            DataMode::Auto => constant.values.len() as i64,
            DataMode::Sizeof => {
                let reference = constant.reference.as_deref().unwrap_or_default();
                size_of(reference, cmap, visited)?
            }
        };
        visited.remove(name);
        Ok(size)
    }

    let mut resolved: HashSet<String> = HashSet::new();
    let mut result = Vec::with_capacity(nodes.len());
    for node in nodes {
        if let Node::Label {
            define: false,
            ref name,
        } = node
        {
            if !imports.contains(name) {
                if let Some(constant) = cmap.get(name.as_str()) {
                    if constant.mode == DataMode::Sizeof {
                        let reference = constant.reference.as_deref().unwrap_or_default();
                        let mut visited = HashSet::new();
                        let size = size_of(reference, &cmap, &mut visited)?;
                        resolved.insert(name.clone());
                        result.push(Node::Int(size));
                        continue;
                    }
                }
            }
        }
        result.push(node);
    }

    let kept = constants
        .iter()
        .filter(|c| !(c.mode == DataMode::Sizeof && resolved.contains(&c.name)))
        .cloned()
        .collect();
    Ok((kept, result))
}
