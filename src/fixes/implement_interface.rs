//! `class Crate implements Box` missing members of `Box` (TS2420): declares
//! every missing property and method, including those `Box` inherits through
//! `extends`, with generic arguments filled in.

use std::collections::{BTreeSet, HashMap, HashSet};

use tree_sitter::Node;

use super::{insert_member, type_container};
use crate::document::SourceFile;
use crate::edits::EditBatch;
use crate::error::{RefactorError, Result};
use crate::locator;
use crate::program::{Program, SymbolId};
use crate::registry::{ActionContext, ActionKind, ActionResult, CodeFix};
use crate::syntax::{self, SyntaxKind};

/// "Class 'Crate' incorrectly implements interface 'Box'."
const INCORRECTLY_IMPLEMENTS: u32 = 2420;

pub struct ImplementInterface;

struct Target<'a> {
    class: Node<'a>,
    interfaces: Vec<String>,
    /// Rendered members in declaration order, deepest base last.
    members: Vec<String>,
}

/// Type names listed by a heritage clause, each with its generic arguments.
fn heritage_types(clause: Node) -> Vec<(Node, Option<Node>)> {
    syntax::named_children(clause)
        .into_iter()
        .filter_map(|ty| match ty.kind() {
            "type_identifier" => Some((ty, None)),
            "generic_type" => Some((ty.child_by_field_name("name")?, ty.child_by_field_name("type_arguments"))),
            _ => None,
        })
        .collect()
}

fn is_class(node: Node) -> bool {
    matches!(
        SyntaxKind::of(node),
        SyntaxKind::ClassDeclaration | SyntaxKind::AbstractClassDeclaration
    )
}

/// Text of `node` with type parameters replaced by their arguments.
fn substitute(file: &SourceFile, node: Node, substitutions: &HashMap<String, String>) -> String {
    let mut hits: Vec<(std::ops::Range<usize>, &str)> = Vec::new();
    if !substitutions.is_empty() {
        syntax::walk_descendants(node, &mut |n| {
            if SyntaxKind::of(n) == SyntaxKind::TypeIdentifier {
                if let Some(arg) = substitutions.get(file.node_text(n)) {
                    hits.push((n.byte_range(), arg.as_str()));
                }
            }
        });
    }
    let mut out = String::new();
    let mut at = node.start_byte();
    for (range, arg) in hits {
        out.push_str(&file.text[at..range.start]);
        out.push_str(arg);
        at = range.end;
    }
    out.push_str(&file.text[at..node.end_byte()]);
    out
}

fn type_arguments(file: &SourceFile, arguments: Option<Node>, substitutions: &HashMap<String, String>) -> Vec<String> {
    arguments
        .map(syntax::named_children)
        .unwrap_or_default()
        .into_iter()
        .map(|arg| substitute(file, arg, substitutions))
        .collect()
}

/// Property or method stub for a class, from an interface member.
fn render_member(file: &SourceFile, member: Node, substitutions: &HashMap<String, String>) -> Option<String> {
    let text = substitute(file, member, substitutions);
    let signature = text.trim_end_matches([';', ',']).trim_end();
    match SyntaxKind::of(member) {
        SyntaxKind::PropertySignature => Some(format!("{};", signature)),
        SyntaxKind::MethodSignature => Some(format!(
            "{} {{\n    throw new Error('Not implemented');\n}}",
            signature
        )),
        _ => None,
    }
}

struct Collector<'p> {
    program: &'p Program,
    seen: BTreeSet<SymbolId>,
    /// Member names the class already has or will receive.
    names: HashSet<String>,
    members: Vec<String>,
}

impl<'p> Collector<'p> {
    /// Names the class declares or inherits through `extends`.
    fn class_names(&mut self, file: &'p SourceFile, class: Node<'p>) -> Result<()> {
        if let Some(body) = class.child_by_field_name("body") {
            for member in syntax::named_children(body) {
                if let Some(name) = member.child_by_field_name("name") {
                    self.names.insert(file.node_text(name).to_string());
                }
            }
        }
        let base = syntax::child_of_kind(class, SyntaxKind::ClassHeritage)
            .and_then(|heritage| syntax::children(heritage).into_iter().find(|c| c.kind() == "extends_clause"))
            .and_then(|clause| clause.child_by_field_name("value"));
        let Some(base) = base else {
            return Ok(());
        };
        let Some(symbol) = self.program.resolve_name_at(file, base)? else {
            return Ok(());
        };
        if !self.seen.insert(symbol.clone()) {
            return Ok(());
        }
        match type_container(self.program, &symbol) {
            Some((base_file, base_class)) if is_class(base_class) => self.class_names(base_file, base_class),
            _ => Ok(()),
        }
    }

    fn interface(&mut self, file: &'p SourceFile, name: Node<'p>, args: Vec<String>) -> Result<()> {
        let Some(symbol) = self.program.resolve_name_at(file, name)? else {
            tracing::debug!("implements `{}`: unresolved", file.node_text(name));
            return Ok(());
        };
        if !self.seen.insert(symbol.clone()) {
            return Ok(());
        }
        let Some((iface_file, iface)) = type_container(self.program, &symbol) else {
            return Ok(());
        };
        if SyntaxKind::of(iface) != SyntaxKind::InterfaceDeclaration {
            return Ok(());
        }

        let substitutions: HashMap<String, String> = iface
            .child_by_field_name("type_parameters")
            .map(syntax::named_children)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| p.child_by_field_name("name"))
            .map(|n| iface_file.node_text(n).to_string())
            .zip(args)
            .collect();

        if let Some(body) = iface.child_by_field_name("body") {
            for member in syntax::named_children(body) {
                let Some(member_name) = member.child_by_field_name("name") else {
                    continue;
                };
                let member_name = iface_file.node_text(member_name);
                if self.names.contains(member_name) {
                    continue;
                }
                if let Some(rendered) = render_member(iface_file, member, &substitutions) {
                    self.names.insert(member_name.to_string());
                    self.members.push(rendered);
                }
            }
        }

        if let Some(clause) = syntax::child_of_kind(iface, SyntaxKind::ExtendsTypeClause) {
            for (base, base_args) in heritage_types(clause) {
                let base_args = type_arguments(iface_file, base_args, &substitutions);
                self.interface(iface_file, base, base_args)?;
            }
        }
        Ok(())
    }
}

impl ImplementInterface {
    fn target<'a>(ctx: &ActionContext<'a>) -> Result<Option<Target<'a>>> {
        let Some(node) = ctx.target() else {
            return Ok(None);
        };
        let Some(class) = locator::find_ascendant(node, is_class, true) else {
            return Ok(None);
        };
        let Some(body) = class.child_by_field_name("body") else {
            return Ok(None);
        };
        let header = class.start_byte()..body.start_byte();
        if !ctx
            .diagnostics
            .iter()
            .any(|d| d.code == INCORRECTLY_IMPLEMENTS && d.overlaps(&header) && d.overlaps(&ctx.range))
        {
            return Ok(None);
        }
        let Some(clause) = syntax::child_of_kind(class, SyntaxKind::ClassHeritage)
            .and_then(|heritage| syntax::child_of_kind(heritage, SyntaxKind::ImplementsClause))
        else {
            return Ok(None);
        };

        let mut collector = Collector {
            program: ctx.program,
            seen: BTreeSet::new(),
            names: HashSet::new(),
            members: Vec::new(),
        };
        collector.class_names(ctx.file, class)?;
        let mut interfaces = Vec::new();
        for (name, args) in heritage_types(clause) {
            interfaces.push(ctx.file.node_text(name).to_string());
            let args = type_arguments(ctx.file, args, &HashMap::new());
            collector.interface(ctx.file, name, args)?;
        }
        if collector.members.is_empty() {
            return Ok(None);
        }
        Ok(Some(Target {
            class,
            interfaces,
            members: collector.members,
        }))
    }

    fn require<'a>(ctx: &ActionContext<'a>) -> Result<Target<'a>> {
        Self::target(ctx)?.ok_or_else(|| RefactorError::not_applicable("no missing interface members"))
    }
}

impl CodeFix for ImplementInterface {
    fn name(&self) -> &'static str {
        "implementInterface"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::QuickFix
    }

    fn predicate(&self, ctx: &ActionContext) -> Result<bool> {
        Ok(Self::target(ctx)?.is_some())
    }

    fn description(&self, ctx: &ActionContext) -> Result<String> {
        let target = Self::require(ctx)?;
        Ok(format!("Implement interface \"{}\"", target.interfaces.join(", ")))
    }

    fn apply(&self, ctx: &ActionContext) -> Result<ActionResult> {
        let target = Self::require(ctx)?;
        let Some(body) = target.class.child_by_field_name("body") else {
            return Err(RefactorError::resolution("body of the implementing class"));
        };
        // One insertion at the point computed on the unedited body.
        let mut batch = EditBatch::new();
        batch.push(insert_member(ctx.file, body, &target.members.join("\n"), false));
        Ok(batch.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RefactorConfig;
    use crate::diagnostics::Diagnostic;
    use crate::registry::ActionArgs;
    use std::path::PathBuf;

    fn incorrectly_implements(start: usize, length: usize) -> Diagnostic {
        Diagnostic {
            code: INCORRECTLY_IMPLEMENTS,
            start,
            length,
            message_text: "Class incorrectly implements interface.".to_string(),
        }
    }

    #[test]
    fn test_fills_empty_class_body() {
        let path = PathBuf::from("/p/a.ts");
        let text = "interface Shape {\n  area(): number\n  readonly name: string\n}\nclass Square implements Shape {}\n";
        let program = Program::from_sources(vec![(path.clone(), text.to_string())]);
        let file = program.file(&path).unwrap();
        let at = text.find("Square").unwrap();
        let diagnostics = [incorrectly_implements(at, 6)];
        let config = RefactorConfig::default();
        let args = ActionArgs::default();
        let ctx = ActionContext::new(&program, file, at..at, &diagnostics, &config, &args);

        assert!(ImplementInterface.predicate(&ctx).unwrap());
        assert_eq!(ImplementInterface.description(&ctx).unwrap(), "Implement interface \"Shape\"");
        let out = ImplementInterface.apply(&ctx).unwrap().batch.apply(&program).unwrap();
        assert_eq!(
            out[&path],
            "interface Shape {\n  area(): number\n  readonly name: string\n}\nclass Square implements Shape {\n    area(): number {\n        throw new Error('Not implemented');\n    }\n    readonly name: string;\n}\n"
        );
    }

    #[test]
    fn test_fills_non_empty_body_through_extends_and_generics() {
        let main = PathBuf::from("/p/main.ts");
        let shapes = PathBuf::from("/p/shapes.ts");
        let main_text = "import { Box } from './shapes'\nclass Crate implements Box<number> {\n    name = 'crate'\n}\n";
        let program = Program::from_sources(vec![
            (main.clone(), main_text.to_string()),
            (
                shapes.clone(),
                "export interface Named {\n  name: string\n  label?: string\n}\nexport interface Box<T> extends Named {\n  value: T\n  open(key: T): boolean;\n}\n"
                    .to_string(),
            ),
        ]);
        let file = program.file(&main).unwrap();
        let at = main_text.find("Crate").unwrap();
        let diagnostics = [incorrectly_implements(at, 5)];
        let config = RefactorConfig::default();
        let args = ActionArgs::default();
        let ctx = ActionContext::new(&program, file, at..at, &diagnostics, &config, &args);

        let out = ImplementInterface.apply(&ctx).unwrap().batch.apply(&program).unwrap();
        assert_eq!(
            out[&main],
            "import { Box } from './shapes'\nclass Crate implements Box<number> {\n    name = 'crate'\n    value: number;\n    open(key: number): boolean {\n        throw new Error('Not implemented');\n    }\n    label?: string;\n}\n"
        );
    }

    #[test]
    fn test_not_offered_when_complete_or_without_diagnostic() {
        let path = PathBuf::from("/p/a.ts");
        let text = "interface I {\n  a: number\n}\nclass Base {\n  a = 1\n}\nclass C extends Base implements I {}\nclass D implements I {}\n";
        let program = Program::from_sources(vec![(path.clone(), text.to_string())]);
        let file = program.file(&path).unwrap();
        let config = RefactorConfig::default();
        let args = ActionArgs::default();

        let at = text.find("C extends").unwrap();
        let diagnostics = [incorrectly_implements(at, 1)];
        let inherited = ActionContext::new(&program, file, at..at, &diagnostics, &config, &args);
        assert!(!ImplementInterface.predicate(&inherited).unwrap());

        let at = text.find("D implements").unwrap();
        let none = ActionContext::new(&program, file, at..at, &[], &config, &args);
        assert!(!ImplementInterface.predicate(&none).unwrap());
        let diagnostics = [incorrectly_implements(at, 1)];
        let offered = ActionContext::new(&program, file, at..at, &diagnostics, &config, &args);
        assert!(ImplementInterface.predicate(&offered).unwrap());
    }
}
