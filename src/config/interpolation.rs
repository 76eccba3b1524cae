//! Resolution of `${...}` references and resolver calls inside a config tree.

use std::{collections::HashMap, env, fmt::Write as _};

use chrono::{DateTime, Local};
use serde_json::{Map, Value};

use crate::{
    config::node::{get_path, join_key, scalar_to_string, split_key},
    lib::errors::InterpolationError,
};

/// Value marking a mandatory field that was left unset.
pub const MISSING_VALUE: &str = "???";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Text(String),
    Expr(String),
}

/// Resolves interpolations against an immutable snapshot of the tree.
pub struct Resolver<'a> {
    root: &'a Value,
    hydra: Option<&'a Value>,
    now: DateTime<Local>,
    cache: HashMap<String, Value>,
    in_progress: Vec<String>,
}

impl<'a> Resolver<'a> {
    pub fn new(root: &'a Value) -> Self {
        Self {
            root,
            hydra: None,
            now: Local::now(),
            cache: HashMap::new(),
            in_progress: Vec::new(),
        }
    }

    /// Node read by the `hydra:` resolver.
    pub fn with_hydra(mut self, hydra: &'a Value) -> Self {
        self.hydra = Some(hydra);
        self
    }

    /// Timestamp used by the `now:` resolver.
    pub fn with_now(mut self, now: DateTime<Local>) -> Self {
        self.now = now;
        self
    }

    /// Return a copy of the whole tree with every interpolation resolved.
    pub fn resolve_all(&mut self) -> Result<Value, InterpolationError> {
        let root = self.root;
        self.resolve_node(&[], root)
    }

    /// Resolve the subtree at `path` (dotted key).
    pub fn resolve_at(&mut self, key: &str) -> Result<Value, InterpolationError> {
        let path = split_key(key);
        let root = self.root;
        let node = get_path(root, &path).ok_or_else(|| InterpolationError::KeyNotFound {
            key: key.to_string(),
            node: String::new(),
        })?;
        self.resolve_node(&path, node)
    }

    fn resolve_node(&mut self, path: &[String], node: &'a Value) -> Result<Value, InterpolationError> {
        match node {
            Value::String(text) if text.contains("${") => self.resolve_string(path, text),
            Value::Object(map) => {
                let mut resolved = Map::new();
                for (key, child) in map {
                    let child_path = extend(path, key);
                    resolved.insert(key.clone(), self.resolve_node(&child_path, child)?);
                }
                Ok(Value::Object(resolved))
            }
            Value::Array(items) => {
                let mut resolved = Vec::with_capacity(items.len());
                for (index, child) in items.iter().enumerate() {
                    let child_path = extend(path, &index.to_string());
                    resolved.push(self.resolve_node(&child_path, child)?);
                }
                Ok(Value::Array(resolved))
            }
            other => Ok(other.clone()),
        }
    }

    fn resolve_string(&mut self, path: &[String], text: &str) -> Result<Value, InterpolationError> {
        let key = join_key(path);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached.clone());
        }
        if self.in_progress.contains(&key) {
            let mut chain = self.in_progress.clone();
            chain.push(key);
            return Err(InterpolationError::Cycle {
                chain: chain.join(" -> "),
            });
        }

        self.in_progress.push(key.clone());
        let result = self.evaluate_text(path, text);
        self.in_progress.pop();

        let value = result?;
        self.cache.insert(key, value.clone());
        Ok(value)
    }

    /// Evaluate a string that may hold several interpolations.
    fn evaluate_text(&mut self, path: &[String], text: &str) -> Result<Value, InterpolationError> {
        let node = join_key(path);
        let pieces = parse_pieces(text).map_err(|message| InterpolationError::Syntax {
            node: node.clone(),
            message,
        })?;

        if let [Piece::Expr(expr)] = pieces.as_slice() {
            return self.evaluate_expr(path, expr);
        }

        let mut rendered = String::new();
        for piece in pieces {
            match piece {
                Piece::Text(text) => rendered.push_str(&text),
                Piece::Expr(expr) => {
                    let value = self.evaluate_expr(path, &expr)?;
                    let text = scalar_to_string(&value).ok_or_else(|| {
                        InterpolationError::NonScalarInString { node: node.clone() }
                    })?;
                    rendered.push_str(&text);
                }
            }
        }
        Ok(Value::String(rendered))
    }

    fn evaluate_expr(&mut self, path: &[String], expr: &str) -> Result<Value, InterpolationError> {
        let expr = if expr.contains("${") {
            match self.evaluate_text(path, expr)? {
                Value::String(text) => text,
                other => scalar_to_string(&other).unwrap_or_default(),
            }
        } else {
            expr.trim().to_string()
        };

        match split_resolver(&expr) {
            Some((name, args)) => self.call_resolver(path, name, args),
            None => self.lookup(path, &expr),
        }
    }

    /// Follow an absolute or relative reference and resolve the target.
    fn lookup(&mut self, path: &[String], reference: &str) -> Result<Value, InterpolationError> {
        let target = reference_path(path, reference).ok_or_else(|| {
            InterpolationError::KeyNotFound {
                key: reference.to_string(),
                node: join_key(path),
            }
        })?;
        let root = self.root;
        let node = get_path(root, &target).ok_or_else(|| InterpolationError::KeyNotFound {
            key: reference.to_string(),
            node: join_key(path),
        })?;
        self.resolve_node(&target, node)
    }

    fn call_resolver(
        &mut self,
        path: &[String],
        name: &str,
        args: &str,
    ) -> Result<Value, InterpolationError> {
        let node = join_key(path);
        let failure = |message: String| InterpolationError::Resolver {
            name: name.to_string(),
            node: node.clone(),
            message,
        };

        match name {
            "oc.env" => {
                let (var, default) = split_default(args);
                match env::var(var) {
                    Ok(value) => Ok(Value::String(value)),
                    Err(_) => default
                        .map(parse_default)
                        .ok_or_else(|| failure(format!("environment variable '{var}' not found"))),
                }
            }
            "now" => {
                let mut rendered = String::new();
                write!(rendered, "{}", self.now.format(args))
                    .map_err(|_| failure(format!("invalid time format '{args}'")))?;
                Ok(Value::String(rendered))
            }
            "oc.select" => {
                let (key, default) = split_default(args);
                let exists = reference_path(path, key)
                    .and_then(|target| get_path(self.root, &target))
                    .is_some();
                if exists {
                    self.lookup(path, key)
                } else {
                    Ok(default.map(parse_default).unwrap_or(Value::Null))
                }
            }
            "hydra" => {
                let hydra = self
                    .hydra
                    .ok_or_else(|| failure("runtime node is not available here".into()))?;
                get_path(hydra, &split_key(args.trim()))
                    .cloned()
                    .ok_or_else(|| InterpolationError::KeyNotFound {
                        key: format!("hydra.{}", args.trim()),
                        node: node.clone(),
                    })
            }
            _ => Err(InterpolationError::UnknownResolver {
                name: name.to_string(),
                node,
            }),
        }
    }
}

/// Resolve every interpolation of `root` in place.
pub fn resolve_in_place(
    root: &mut Value,
    hydra: Option<&Value>,
    now: DateTime<Local>,
) -> Result<(), InterpolationError> {
    let resolved = {
        let mut resolver = Resolver::new(root).with_now(now);
        if let Some(hydra) = hydra {
            resolver = resolver.with_hydra(hydra);
        }
        resolver.resolve_all()?
    };
    *root = resolved;
    Ok(())
}

fn extend(path: &[String], segment: &str) -> Vec<String> {
    let mut next = path.to_vec();
    next.push(segment.to_string());
    next
}

/// Split `name:args` when `name` looks like a resolver name.
fn split_resolver(expr: &str) -> Option<(&str, &str)> {
    let (name, args) = expr.split_once(':')?;
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '.');
    valid.then_some((name.trim(), args))
}

/// Absolute path of a reference made from the node at `path`.
///
/// Leading dots are relative to the node's parent container: one dot is a
/// sibling, each extra dot climbs one level.
fn reference_path(path: &[String], reference: &str) -> Option<Vec<String>> {
    let dots = reference.chars().take_while(|ch| *ch == '.').count();
    let rest = &reference[dots..];
    if dots == 0 {
        return Some(split_key(rest));
    }
    let container_len = path.len().checked_sub(1)?;
    let base_len = container_len.checked_sub(dots - 1)?;
    let mut target = path[..base_len].to_vec();
    target.extend(split_key(rest));
    Some(target)
}

fn split_default(args: &str) -> (&str, Option<&str>) {
    match args.split_once(',') {
        Some((key, default)) => (key.trim(), Some(default.trim())),
        None => (args.trim(), None),
    }
}

fn parse_default(text: &str) -> Value {
    let unquoted = text
        .strip_prefix('\'')
        .and_then(|t| t.strip_suffix('\''))
        .or_else(|| text.strip_prefix('"').and_then(|t| t.strip_suffix('"')));
    match unquoted {
        Some(inner) => Value::String(inner.to_string()),
        None if text == "null" => Value::Null,
        None => Value::String(text.to_string()),
    }
}

/// Split text into literal and `${...}` pieces, honouring `\${` escapes.
fn parse_pieces(text: &str) -> Result<Vec<Piece>, String> {
    let mut pieces = Vec::new();
    let mut literal = String::new();
    let chars: Vec<char> = text.chars().collect();
    let mut index = 0;

    while index < chars.len() {
        let ch = chars[index];
        if ch == '\\' && chars.get(index + 1) == Some(&'$') && chars.get(index + 2) == Some(&'{') {
            literal.push_str("${");
            index += 3;
            continue;
        }
        if ch == '$' && chars.get(index + 1) == Some(&'{') {
            let start = index + 2;
            let mut depth = 1usize;
            let mut end = start;
            while end < chars.len() {
                match chars[end] {
                    '{' => depth += 1,
                    '}' => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                }
                end += 1;
            }
            if depth != 0 {
                return Err(format!("unterminated interpolation in '{text}'"));
            }
            if !literal.is_empty() {
                pieces.push(Piece::Text(std::mem::take(&mut literal)));
            }
            let inner: String = chars[start..end].iter().collect();
            if inner.trim().is_empty() {
                return Err("empty interpolation '${}'".into());
            }
            pieces.push(Piece::Expr(inner));
            index = end + 1;
            continue;
        }
        literal.push(ch);
        index += 1;
    }

    if !literal.is_empty() || pieces.is_empty() {
        pieces.push(Piece::Text(literal));
    }
    Ok(pieces)
}
