use tree_sitter::Parser;

const SAMPLE: &str = r#"import { Greeter } from './greeter'

export interface User {
  name: string
  age?: number
}

export function greet(user: User, loud = false) {
  const text = `Hello, ${user.name}`
  return loud ? text.toUpperCase() : text
}

class Counter extends Greeter {
  count = 0
  bump(by: number) { this.count += by }
}
"#;

fn main() {
    let path = std::env::args().nth(1);
    let source = match &path {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                eprintln!("Failed to read {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => SAMPLE.to_string(),
    };

    let language = match path.as_deref() {
        Some(p) if p.ends_with(".tsx") => tree_sitter_typescript::LANGUAGE_TSX,
        _ => tree_sitter_typescript::LANGUAGE_TYPESCRIPT,
    };

    let mut parser = Parser::new();
    parser
        .set_language(&language.into())
        .expect("Failed to load TypeScript grammar");

    match parser.parse(&source, None) {
        Some(tree) => {
            println!("Parse successful! (errors: {})", tree.root_node().has_error());
            println!("\nTree structure:");
            print_tree(&tree.root_node(), &source, 0, None);
        }
        None => {
            println!("Parse failed!");
        }
    }
}

fn print_tree(node: &tree_sitter::Node, source: &str, indent: usize, field: Option<&str>) {
    let kind = node.kind();
    let range = format!(
        "[{},{}]-[{},{}]",
        node.start_position().row,
        node.start_position().column,
        node.end_position().row,
        node.end_position().column
    );

    let prefix = "  ".repeat(indent);
    let label = match field {
        Some(field) => format!("{}: {}", field, kind),
        None => kind.to_string(),
    };
    if node.child_count() == 0 {
        let text = &source[node.byte_range()];
        let preview: String = text.chars().take(30).collect();
        println!("{}{} {} \"{}\"", prefix, label, range, preview.replace('\n', "\\n"));
    } else {
        println!("{}{} {}", prefix, label, range);
    }

    let mut cursor = node.walk();
    for (i, child) in node.children(&mut cursor).enumerate() {
        print_tree(&child, source, indent + 1, node.field_name_for_child(i as u32));
    }
}
