//! USDA text serialization of [`Layer`]s.
//!
//! [`to_usda`] writes the subset of the format the model covers.
//! [`parse`] reads that subset back, along with the property statements and
//! metadata of layers written by other tools, which are kept as raw text.

use std::fmt::Write;

use super::{Layer, Opinions, PrimSpec, Property, Reference, Specifier, Variant, VariantSet};
use crate::error::{Error, Result};

const INDENT: &str = "    ";

/// Serializes a layer as USDA text.
pub fn to_usda(layer: &Layer) -> String {
    let mut out = String::from("#usda 1.0\n");

    let has_metadata =
        layer.default_prim.is_some() || !layer.metadata.is_empty() || !layer.sublayers.is_empty();
    if has_metadata {
        out.push_str("(\n");
        if let Some(default_prim) = &layer.default_prim {
            let _ = writeln!(out, "{}defaultPrim = {}", INDENT, quote(default_prim));
        }
        for (key, value) in &layer.metadata {
            let _ = writeln!(out, "{}{} = {}", INDENT, key, value);
        }
        if !layer.sublayers.is_empty() {
            let _ = writeln!(out, "{}subLayers = [", INDENT);
            let last = layer.sublayers.len() - 1;
            for (i, sublayer) in layer.sublayers.iter().enumerate() {
                let separator = if i == last { "" } else { "," };
                let _ = writeln!(out, "{0}{0}@{1}@{2}", INDENT, sublayer, separator);
            }
            let _ = writeln!(out, "{}]", INDENT);
        }
        out.push_str(")\n");
    }

    for prim in &layer.root_prims {
        out.push('\n');
        write_prim(&mut out, prim, 0);
    }
    out
}

fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

fn reference_text(reference: &Reference) -> String {
    let mut text = String::new();
    if !reference.asset_path.is_empty() {
        let _ = write!(text, "@{}@", reference.asset_path);
    }
    if let Some(prim_path) = &reference.prim_path {
        let _ = write!(text, "<{}>", prim_path);
    }
    text
}

/// Writes the metadata block shared by prims and variants, if any.
fn write_metadata(out: &mut String, opinions: &Opinions, depth: usize) -> bool {
    let pad = INDENT.repeat(depth + 1);
    let mut lines = Vec::new();

    match opinions.references.as_slice() {
        [] => {}
        [single] => lines.push(format!("{}prepend references = {}", pad, reference_text(single))),
        many => {
            let mut block = format!("{}prepend references = [\n", pad);
            let last = many.len() - 1;
            for (i, reference) in many.iter().enumerate() {
                let separator = if i == last { "" } else { "," };
                let _ = writeln!(block, "{}{}{}{}", pad, INDENT, reference_text(reference), separator);
            }
            let _ = write!(block, "{}]", pad);
            lines.push(block);
        }
    }

    for (key, value) in &opinions.metadata {
        lines.push(format!("{}{} = {}", pad, key, value));
    }

    if !opinions.selections.is_empty() {
        let mut block = format!("{}variants = {{\n", pad);
        for (set, variant) in &opinions.selections {
            let _ = writeln!(block, "{}{}string {} = {}", pad, INDENT, set, quote(variant));
        }
        let _ = write!(block, "{}}}", pad);
        lines.push(block);
    }

    match opinions.variant_sets.as_slice() {
        [] => {}
        [single] => lines.push(format!("{}prepend variantSets = {}", pad, quote(&single.name))),
        many => {
            let names: Vec<String> = many.iter().map(|s| quote(&s.name)).collect();
            lines.push(format!("{}prepend variantSets = [{}]", pad, names.join(", ")));
        }
    }

    if lines.is_empty() {
        return false;
    }
    out.push_str(" (\n");
    for line in lines {
        out.push_str(&line);
        out.push('\n');
    }
    let _ = write!(out, "{})", INDENT.repeat(depth));
    true
}

fn write_prim(out: &mut String, prim: &PrimSpec, depth: usize) {
    let pad = INDENT.repeat(depth);
    let _ = write!(out, "{}{} ", pad, prim.specifier.keyword());
    if let Some(type_name) = &prim.type_name {
        let _ = write!(out, "{} ", type_name);
    }
    out.push_str(&quote(&prim.name));
    write_metadata(out, &prim.opinions, depth);
    out.push('\n');
    let _ = writeln!(out, "{}{{", pad);
    write_body(out, &prim.opinions, depth + 1);
    let _ = writeln!(out, "{}}}", pad);
}

fn write_body(out: &mut String, opinions: &Opinions, depth: usize) {
    let pad = INDENT.repeat(depth);
    for property in &opinions.properties {
        let _ = writeln!(out, "{}{}", pad, property.raw);
    }
    for set in &opinions.variant_sets {
        let _ = writeln!(out, "{}variantSet {} = {{", pad, quote(&set.name));
        for variant in &set.variants {
            write_variant(out, variant, depth + 1);
        }
        let _ = writeln!(out, "{}}}", pad);
    }
    for (i, child) in opinions.children.iter().enumerate() {
        if i > 0 || !opinions.properties.is_empty() || !opinions.variant_sets.is_empty() {
            out.push('\n');
        }
        write_prim(out, child, depth);
    }
}

fn write_variant(out: &mut String, variant: &Variant, depth: usize) {
    let pad = INDENT.repeat(depth);
    let _ = write!(out, "{}{}", pad, quote(&variant.name));
    write_metadata(out, &variant.opinions, depth);
    out.push_str(" {\n");
    write_body(out, &variant.opinions, depth + 1);
    let _ = writeln!(out, "{}}}", pad);
}

/// Parses USDA text into a layer.
pub fn parse(text: &str) -> Result<Layer> {
    Parser::new(text).layer()
}

struct Parser<'s> {
    src: &'s str,
    pos: usize,
}

impl<'s> Parser<'s> {
    fn new(src: &'s str) -> Self {
        Self { src, pos: 0 }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        let line = self.src[..self.pos].matches('\n').count() + 1;
        Error::Document {
            message: message.into(),
            location: Some(format!("line {}", line)),
        }
    }

    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() || c == ';' => {
                    self.bump();
                }
                Some('#') => {
                    let end = self.rest().find('\n').unwrap_or(self.rest().len());
                    self.pos += end;
                }
                _ => break,
            }
        }
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(c) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<()> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected '{}', found {}",
                c,
                self.peek().map_or("end of input".to_string(), |f| format!("'{}'", f))
            )))
        }
    }

    fn peek_ident(&mut self) -> Option<&'s str> {
        self.skip_ws();
        let rest = self.rest();
        let mut chars = rest.char_indices();
        match chars.next() {
            Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return None,
        }
        let end = chars
            .find(|(_, c)| !(c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '.')))
            .map_or(rest.len(), |(i, _)| i);
        let end = if rest[end..].starts_with("[]") { end + 2 } else { end };
        Some(&rest[..end])
    }

    fn ident(&mut self) -> Result<&'s str> {
        let ident = self
            .peek_ident()
            .ok_or_else(|| self.error("expected an identifier"))?;
        self.pos += ident.len();
        Ok(ident)
    }

    fn string(&mut self) -> Result<String> {
        self.skip_ws();
        if self.rest().starts_with("\"\"\"") {
            self.pos += 3;
            let end = self
                .rest()
                .find("\"\"\"")
                .ok_or_else(|| self.error("unterminated triple-quoted string"))?;
            let value = self.rest()[..end].to_string();
            self.pos += end + 3;
            return Ok(value);
        }
        let quote = match self.peek() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(self.error("expected a string")),
        };
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some(c) => value.push(c),
                    None => return Err(self.error("unterminated string")),
                },
                Some(c) if c == quote => return Ok(value),
                Some(c) => value.push(c),
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    fn asset_path(&mut self) -> Result<String> {
        self.skip_ws();
        if self.rest().starts_with("@@@") {
            self.pos += 3;
            let end = self
                .rest()
                .find("@@@")
                .ok_or_else(|| self.error("unterminated asset path"))?;
            let value = self.rest()[..end].to_string();
            self.pos += end + 3;
            return Ok(value);
        }
        self.expect('@')?;
        let end = self
            .rest()
            .find('@')
            .ok_or_else(|| self.error("unterminated asset path"))?;
        let value = self.rest()[..end].to_string();
        self.pos += end + 1;
        Ok(value)
    }

    fn path_ref(&mut self) -> Result<String> {
        self.expect('<')?;
        let end = self
            .rest()
            .find('>')
            .ok_or_else(|| self.error("unterminated path"))?;
        let value = self.rest()[..end].to_string();
        self.pos += end + 1;
        Ok(value)
    }

    /// Skips a value and returns its source text.
    ///
    /// A value ends at a newline (or at an unbalanced closing bracket) once
    /// all brackets, strings and asset paths it opened are closed.
    fn raw_value(&mut self) -> Result<&'s str> {
        self.skip_ws_inline();
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(c) = self.peek() {
            match c {
                '"' | '\'' => {
                    self.string()?;
                    continue;
                }
                '@' => {
                    self.asset_path()?;
                    continue;
                }
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                '\n' if depth == 0 => break,
                _ => {}
            }
            self.bump();
        }
        if depth != 0 {
            return Err(self.error("unbalanced brackets in value"));
        }
        Ok(self.src[start..self.pos].trim_end())
    }

    fn skip_ws_inline(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.bump();
        }
    }

    fn layer(&mut self) -> Result<Layer> {
        if !self.src.starts_with("#usda") {
            return Err(self.error("not a USDA text layer (missing #usda header)"));
        }
        let mut layer = Layer::new();

        if self.eat('(') {
            loop {
                if self.eat(')') {
                    break;
                }
                self.skip_ws();
                if matches!(self.peek(), Some('"' | '\'')) {
                    let doc = self.string()?;
                    layer.metadata.push(("doc".to_string(), quote(&doc)));
                    continue;
                }
                let key = self.ident()?;
                self.expect('=')?;
                match key {
                    "defaultPrim" => layer.default_prim = Some(self.string()?),
                    "subLayers" => {
                        self.expect('[')?;
                        while !self.eat(']') {
                            layer.sublayers.push(self.asset_path()?);
                            if self.eat('(') {
                                self.raw_value()?;
                                self.expect(')')?;
                            }
                            self.eat(',');
                        }
                    }
                    other => {
                        let value = self.raw_value()?;
                        layer.metadata.push((other.to_string(), value.to_string()));
                    }
                }
            }
        }

        loop {
            self.skip_ws();
            if self.peek().is_none() {
                break;
            }
            layer.root_prims.push(self.prim()?);
        }
        Ok(layer)
    }

    fn prim(&mut self) -> Result<PrimSpec> {
        let keyword = self.ident()?;
        let specifier = Specifier::from_keyword(keyword)
            .ok_or_else(|| self.error(format!("expected def, over or class, found '{}'", keyword)))?;
        let type_name = match self.peek_ident() {
            Some(_) => Some(self.ident()?.to_string()),
            None => None,
        };
        let name = self.string()?;
        let mut prim = PrimSpec::new(name, specifier, type_name);
        if self.eat('(') {
            self.metadata(&mut prim.opinions)?;
        }
        self.expect('{')?;
        self.body(&mut prim.opinions)?;
        Ok(prim)
    }

    /// Parses a metadata block up to and including its closing `)`.
    fn metadata(&mut self, opinions: &mut Opinions) -> Result<()> {
        loop {
            if self.eat(')') {
                return Ok(());
            }
            self.skip_ws();
            if matches!(self.peek(), Some('"' | '\'')) {
                let doc = self.string()?;
                opinions.metadata.push(("doc".to_string(), quote(&doc)));
                continue;
            }
            let mut key = self.ident()?;
            let list_op = matches!(key, "prepend" | "append" | "add" | "delete" | "reorder");
            if list_op {
                key = self.ident()?;
            }
            self.expect('=')?;
            match key {
                "references" => {
                    self.skip_ws();
                    if self.rest().starts_with("None") {
                        self.pos += 4;
                    } else if self.eat('[') {
                        while !self.eat(']') {
                            opinions.references.push(self.reference()?);
                            self.eat(',');
                        }
                    } else {
                        opinions.references.push(self.reference()?);
                    }
                }
                "variants" => {
                    self.expect('{')?;
                    while !self.eat('}') {
                        self.ident()?;
                        let set = self.ident()?.to_string();
                        self.expect('=')?;
                        let variant = self.string()?;
                        opinions.selections.insert(set, variant);
                    }
                }
                "variantSets" => {
                    if self.eat('[') {
                        while !self.eat(']') {
                            let name = self.string()?;
                            opinions.add_variant_set(&name);
                            self.eat(',');
                        }
                    } else {
                        let name = self.string()?;
                        opinions.add_variant_set(&name);
                    }
                }
                other => {
                    let value = self.raw_value()?;
                    opinions.metadata.push((other.to_string(), value.to_string()));
                }
            }
        }
    }

    fn reference(&mut self) -> Result<Reference> {
        self.skip_ws();
        let asset_path = if self.peek() == Some('@') {
            self.asset_path()?
        } else {
            String::new()
        };
        self.skip_ws_inline();
        let prim_path = if self.peek() == Some('<') {
            Some(self.path_ref()?)
        } else {
            None
        };
        if asset_path.is_empty() && prim_path.is_none() {
            return Err(self.error("expected a reference"));
        }
        // Layer offsets and other reference metadata are not modelled
        if self.eat('(') {
            self.raw_value()?;
            self.expect(')')?;
        }
        Ok(Reference::new(asset_path, prim_path))
    }

    /// Parses a prim or variant body up to and including its closing `}`.
    fn body(&mut self, opinions: &mut Opinions) -> Result<()> {
        loop {
            if self.eat('}') {
                return Ok(());
            }
            self.skip_ws();
            if self.peek().is_none() {
                return Err(self.error("unexpected end of input inside a prim"));
            }
            match self.peek_ident() {
                Some("def" | "over" | "class") => {
                    let child = self.prim()?;
                    opinions.children.push(child);
                }
                Some("variantSet") => {
                    self.ident()?;
                    let name = self.string()?;
                    self.expect('=')?;
                    self.expect('{')?;
                    let mut set = VariantSet::new(name.clone());
                    while !self.eat('}') {
                        let variant_name = self.string()?;
                        let mut variant = Variant {
                            name: variant_name,
                            opinions: Opinions::default(),
                        };
                        if self.eat('(') {
                            self.metadata(&mut variant.opinions)?;
                        }
                        self.expect('{')?;
                        self.body(&mut variant.opinions)?;
                        set.variants.push(variant);
                    }
                    match opinions.variant_set_mut(&name) {
                        Some(existing) => existing.variants.extend(set.variants),
                        None => opinions.variant_sets.push(set),
                    }
                }
                _ => {
                    let raw = self.raw_value()?;
                    if raw.is_empty() {
                        return Err(self.error(format!(
                            "unexpected '{}'",
                            self.peek().unwrap_or(' ')
                        )));
                    }
                    opinions.properties.push(Property::new(raw));
                }
            }
        }
    }
}
