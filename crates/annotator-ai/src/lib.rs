//! Generative fixes for dereference errors no annotation can resolve.
//!
//! The engine hands over the enclosing method's text; a chat model proposes
//! a rewritten method, which is only accepted if it comes back as a fenced
//! Java block.

mod client;
mod error;
mod prompt;

pub use client::{ChatClient, ChatClientConfig};
pub use error::AiError;
pub use prompt::{dereference_prompt, extract_java_block};

/// Proposes a replacement for a method containing a dereference error.
pub trait MethodFixer {
    /// The full text of a rewritten method, or `None` when no fix could be
    /// produced. Failures never propagate.
    fn rewrite_method(&self, method_name: &str, method_text: &str, error_message: &str) -> Option<String>;
}

impl MethodFixer for ChatClient {
    fn rewrite_method(&self, method_name: &str, method_text: &str, error_message: &str) -> Option<String> {
        let prompt = dereference_prompt(method_name, method_text, error_message);
        match self.complete(&prompt) {
            Ok(reply) => {
                let code = extract_java_block(&reply);
                if code.is_none() {
                    tracing::debug!(method = method_name, "model reply has no java block");
                }
                code
            }
            Err(err) => {
                tracing::debug!(method = method_name, error = %err, "generative fix request failed");
                None
            }
        }
    }
}
