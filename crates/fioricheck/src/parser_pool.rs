//
// parser_pool.rs
//
// Thread-local parser pool for efficient parser reuse
//

use std::cell::RefCell;
use tree_sitter::Parser;

thread_local! {
    static JSON_PARSER: RefCell<Parser> = RefCell::new({
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_json::LANGUAGE.into())
            .expect("Failed to set JSON language");
        parser
    });
}

/// Execute a function with a thread-local JSON parser instance.
/// The parser is reused across calls on the same thread.
pub fn with_json_parser<F, R>(f: F) -> R
where
    F: FnOnce(&mut Parser) -> R,
{
    JSON_PARSER.with(|parser| f(&mut parser.borrow_mut()))
}
