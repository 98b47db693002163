//! Closed set of TypeScript syntax kinds the refactor engine reasons about.
//!
//! Every tree-sitter node is mapped once through [`SyntaxKind::of`]; all
//! structural predicates below match over the enum rather than comparing
//! kind strings.

use tree_sitter::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxKind {
    Program,
    // Declarations
    FunctionDeclaration,
    GeneratorFunctionDeclaration,
    FunctionSignature,
    ClassDeclaration,
    AbstractClassDeclaration,
    InterfaceDeclaration,
    TypeAliasDeclaration,
    EnumDeclaration,
    LexicalDeclaration,
    VariableDeclaration,
    VariableDeclarator,
    AmbientDeclaration,
    // Members
    ClassBody,
    InterfaceBody,
    ObjectType,
    MethodDefinition,
    MethodSignature,
    AbstractMethodSignature,
    PropertySignature,
    PublicFieldDefinition,
    CallSignature,
    ConstructSignature,
    ClassHeritage,
    ImplementsClause,
    ExtendsTypeClause,
    // Function pieces
    FunctionExpression,
    ArrowFunction,
    FormalParameters,
    RequiredParameter,
    OptionalParameter,
    StatementBlock,
    // Expressions
    CallExpression,
    NewExpression,
    Arguments,
    MemberExpression,
    AssignmentExpression,
    AugmentedAssignmentExpression,
    UpdateExpression,
    ExpressionStatement,
    Object,
    Pair,
    Array,
    String,
    TemplateString,
    Number,
    True,
    False,
    Null,
    Undefined,
    This,
    BinaryExpression,
    UnaryExpression,
    ParenthesizedExpression,
    // Modules
    ImportStatement,
    ImportClause,
    NamedImports,
    NamespaceImport,
    ImportSpecifier,
    ExportStatement,
    ExportClause,
    ExportSpecifier,
    NamespaceExport,
    // Names
    Identifier,
    TypeIdentifier,
    PropertyIdentifier,
    ShorthandPropertyIdentifier,
    NestedTypeIdentifier,
    // Misc
    TypeAnnotation,
    Comment,
    Error,
    Other,
}

/// Coarse grouping used by the locator and registry predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Declaration,
    Member,
    FunctionLike,
    CallLike,
    Module,
    Name,
    Expression,
    Structural,
}

impl SyntaxKind {
    pub fn of(node: Node) -> Self {
        Self::from_kind(node.kind())
    }

    pub fn from_kind(kind: &str) -> Self {
        match kind {
            "program" => SyntaxKind::Program,
            "function_declaration" => SyntaxKind::FunctionDeclaration,
            "generator_function_declaration" => SyntaxKind::GeneratorFunctionDeclaration,
            "function_signature" => SyntaxKind::FunctionSignature,
            "class_declaration" => SyntaxKind::ClassDeclaration,
            "abstract_class_declaration" => SyntaxKind::AbstractClassDeclaration,
            "interface_declaration" => SyntaxKind::InterfaceDeclaration,
            "type_alias_declaration" => SyntaxKind::TypeAliasDeclaration,
            "enum_declaration" => SyntaxKind::EnumDeclaration,
            "lexical_declaration" => SyntaxKind::LexicalDeclaration,
            "variable_declaration" => SyntaxKind::VariableDeclaration,
            "variable_declarator" => SyntaxKind::VariableDeclarator,
            "ambient_declaration" => SyntaxKind::AmbientDeclaration,
            "class_body" => SyntaxKind::ClassBody,
            "interface_body" => SyntaxKind::InterfaceBody,
            "object_type" => SyntaxKind::ObjectType,
            "method_definition" => SyntaxKind::MethodDefinition,
            "method_signature" => SyntaxKind::MethodSignature,
            "abstract_method_signature" => SyntaxKind::AbstractMethodSignature,
            "property_signature" => SyntaxKind::PropertySignature,
            "public_field_definition" => SyntaxKind::PublicFieldDefinition,
            "call_signature" => SyntaxKind::CallSignature,
            "construct_signature" => SyntaxKind::ConstructSignature,
            "class_heritage" => SyntaxKind::ClassHeritage,
            "implements_clause" => SyntaxKind::ImplementsClause,
            "extends_type_clause" => SyntaxKind::ExtendsTypeClause,
            "function_expression" | "function" => SyntaxKind::FunctionExpression,
            "arrow_function" => SyntaxKind::ArrowFunction,
            "formal_parameters" => SyntaxKind::FormalParameters,
            "required_parameter" => SyntaxKind::RequiredParameter,
            "optional_parameter" => SyntaxKind::OptionalParameter,
            "statement_block" => SyntaxKind::StatementBlock,
            "call_expression" => SyntaxKind::CallExpression,
            "new_expression" => SyntaxKind::NewExpression,
            "arguments" => SyntaxKind::Arguments,
            "member_expression" => SyntaxKind::MemberExpression,
            "assignment_expression" => SyntaxKind::AssignmentExpression,
            "augmented_assignment_expression" => SyntaxKind::AugmentedAssignmentExpression,
            "update_expression" => SyntaxKind::UpdateExpression,
            "expression_statement" => SyntaxKind::ExpressionStatement,
            "object" => SyntaxKind::Object,
            "pair" => SyntaxKind::Pair,
            "array" => SyntaxKind::Array,
            "string" => SyntaxKind::String,
            "template_string" => SyntaxKind::TemplateString,
            "number" => SyntaxKind::Number,
            "true" => SyntaxKind::True,
            "false" => SyntaxKind::False,
            "null" => SyntaxKind::Null,
            "undefined" => SyntaxKind::Undefined,
            "this" => SyntaxKind::This,
            "binary_expression" => SyntaxKind::BinaryExpression,
            "unary_expression" => SyntaxKind::UnaryExpression,
            "parenthesized_expression" => SyntaxKind::ParenthesizedExpression,
            "import_statement" => SyntaxKind::ImportStatement,
            "import_clause" => SyntaxKind::ImportClause,
            "named_imports" => SyntaxKind::NamedImports,
            "namespace_import" => SyntaxKind::NamespaceImport,
            "import_specifier" => SyntaxKind::ImportSpecifier,
            "export_statement" => SyntaxKind::ExportStatement,
            "export_clause" => SyntaxKind::ExportClause,
            "export_specifier" => SyntaxKind::ExportSpecifier,
            "namespace_export" => SyntaxKind::NamespaceExport,
            "identifier" => SyntaxKind::Identifier,
            "type_identifier" => SyntaxKind::TypeIdentifier,
            "property_identifier" => SyntaxKind::PropertyIdentifier,
            "shorthand_property_identifier" => SyntaxKind::ShorthandPropertyIdentifier,
            "nested_type_identifier" => SyntaxKind::NestedTypeIdentifier,
            "type_annotation" => SyntaxKind::TypeAnnotation,
            "comment" => SyntaxKind::Comment,
            "ERROR" => SyntaxKind::Error,
            _ => SyntaxKind::Other,
        }
    }

    pub fn category(self) -> Category {
        use SyntaxKind::*;
        match self {
            FunctionDeclaration
            | GeneratorFunctionDeclaration
            | FunctionSignature
            | ClassDeclaration
            | AbstractClassDeclaration
            | InterfaceDeclaration
            | TypeAliasDeclaration
            | EnumDeclaration
            | LexicalDeclaration
            | VariableDeclaration
            | VariableDeclarator
            | AmbientDeclaration => Category::Declaration,
            ClassBody | InterfaceBody | ObjectType | PropertySignature | PublicFieldDefinition => {
                Category::Member
            }
            MethodDefinition
            | MethodSignature
            | AbstractMethodSignature
            | CallSignature
            | ConstructSignature
            | FunctionExpression
            | ArrowFunction => Category::FunctionLike,
            CallExpression | NewExpression => Category::CallLike,
            ImportStatement | ImportClause | NamedImports | NamespaceImport | ImportSpecifier
            | ExportStatement | ExportClause | ExportSpecifier | NamespaceExport => Category::Module,
            Identifier | TypeIdentifier | PropertyIdentifier | ShorthandPropertyIdentifier | NestedTypeIdentifier => {
                Category::Name
            }
            Arguments
            | MemberExpression
            | AssignmentExpression
            | AugmentedAssignmentExpression
            | UpdateExpression
            | Object
            | Pair
            | Array
            | String
            | TemplateString
            | Number
            | True
            | False
            | Null
            | Undefined
            | This
            | BinaryExpression
            | UnaryExpression
            | ParenthesizedExpression => Category::Expression,
            Program | FormalParameters | RequiredParameter | OptionalParameter | StatementBlock
            | ExpressionStatement | ClassHeritage | ImplementsClause | ExtendsTypeClause | TypeAnnotation
            | Comment | Error | Other => {
                Category::Structural
            }
        }
    }

    /// Nodes that own a parameter list.
    pub fn is_function_like(self) -> bool {
        use SyntaxKind::*;
        match self {
            FunctionDeclaration | GeneratorFunctionDeclaration | FunctionSignature => true,
            _ => self.category() == Category::FunctionLike,
        }
    }

    pub fn is_call_like(self) -> bool {
        self.category() == Category::CallLike
    }

    /// Declarations without a body whose parameters still have to follow a reorder.
    pub fn is_signature_like(self) -> bool {
        use SyntaxKind::*;
        matches!(
            self,
            FunctionSignature
                | MethodSignature
                | AbstractMethodSignature
                | CallSignature
                | ConstructSignature
        )
    }

    pub fn is_name(self) -> bool {
        self.category() == Category::Name
    }

    /// Names that can refer to a top-level binding (property names cannot).
    pub fn is_binding_reference(self) -> bool {
        matches!(
            self,
            SyntaxKind::Identifier | SyntaxKind::TypeIdentifier | SyntaxKind::ShorthandPropertyIdentifier
        )
    }
}

/// Kinds of top-level declarations that can be moved and referenced across files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum DeclarationKind {
    Function,
    FunctionOverload,
    Class,
    Interface,
    TypeAlias,
    Enum,
    Variable,
}

impl DeclarationKind {
    pub fn from_syntax(kind: SyntaxKind) -> Option<Self> {
        use SyntaxKind::*;
        match kind {
            FunctionDeclaration | GeneratorFunctionDeclaration => Some(DeclarationKind::Function),
            FunctionSignature => Some(DeclarationKind::FunctionOverload),
            ClassDeclaration | AbstractClassDeclaration => Some(DeclarationKind::Class),
            InterfaceDeclaration => Some(DeclarationKind::Interface),
            TypeAliasDeclaration => Some(DeclarationKind::TypeAlias),
            EnumDeclaration => Some(DeclarationKind::Enum),
            VariableDeclarator => Some(DeclarationKind::Variable),
            _ => None,
        }
    }

    pub fn is_function(self) -> bool {
        matches!(self, DeclarationKind::Function | DeclarationKind::FunctionOverload)
    }

    /// Declarations the move rewriter knows how to relocate.
    pub fn is_movable(self) -> bool {
        !matches!(self, DeclarationKind::Variable | DeclarationKind::FunctionOverload)
    }

    /// Lower-case label used in action descriptions.
    pub fn label(self) -> &'static str {
        match self {
            DeclarationKind::Function | DeclarationKind::FunctionOverload => "function",
            DeclarationKind::Class => "class",
            DeclarationKind::Interface => "interface",
            DeclarationKind::TypeAlias => "type",
            DeclarationKind::Enum => "enum",
            DeclarationKind::Variable => "variable",
        }
    }
}

pub fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    &source[node.byte_range()]
}

/// Named children, skipping comments.
pub fn named_children<'tree>(node: Node<'tree>) -> Vec<Node<'tree>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| SyntaxKind::of(*child) != SyntaxKind::Comment)
        .collect()
}

pub fn children<'tree>(node: Node<'tree>) -> Vec<Node<'tree>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

pub fn child_of_kind<'tree>(node: Node<'tree>, kind: SyntaxKind) -> Option<Node<'tree>> {
    children(node).into_iter().find(|child| SyntaxKind::of(*child) == kind)
}

/// Whether `node` has an anonymous token child spelled `token` (e.g. `default`).
pub fn has_token(node: Node, token: &str) -> bool {
    children(node)
        .into_iter()
        .any(|child| !child.is_named() && child.kind() == token)
}

/// Walks `node` and its descendants in document order.
pub fn walk_descendants<'tree>(node: Node<'tree>, visit: &mut dyn FnMut(Node<'tree>)) {
    visit(node);
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_descendants(child, visit);
    }
}

/// The parameter list nodes of a function-like node (comments excluded).
pub fn parameters_of<'tree>(node: Node<'tree>) -> Option<Vec<Node<'tree>>> {
    if let Some(params) = node.child_by_field_name("parameters") {
        return Some(named_children(params));
    }
    // `x => x` arrow functions carry a single bare parameter.
    node.child_by_field_name("parameter").map(|p| vec![p])
}

pub fn arguments_of<'tree>(node: Node<'tree>) -> Option<Vec<Node<'tree>>> {
    node.child_by_field_name("arguments").map(named_children)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping_and_categories() {
        assert_eq!(SyntaxKind::from_kind("call_expression"), SyntaxKind::CallExpression);
        assert!(SyntaxKind::CallExpression.is_call_like());
        assert!(SyntaxKind::NewExpression.is_call_like());
        assert!(SyntaxKind::FunctionDeclaration.is_function_like());
        assert!(SyntaxKind::MethodSignature.is_function_like());
        assert!(SyntaxKind::MethodSignature.is_signature_like());
        assert!(!SyntaxKind::MethodDefinition.is_signature_like());
        assert_eq!(SyntaxKind::from_kind("some_future_node"), SyntaxKind::Other);
        assert_eq!(SyntaxKind::Other.category(), Category::Structural);
    }

    #[test]
    fn test_declaration_kinds() {
        assert_eq!(
            DeclarationKind::from_syntax(SyntaxKind::InterfaceDeclaration),
            Some(DeclarationKind::Interface)
        );
        assert!(DeclarationKind::Class.is_movable());
        assert!(!DeclarationKind::Variable.is_movable());
        assert_eq!(DeclarationKind::from_syntax(SyntaxKind::Identifier), None);
    }
}
