//! Prompts for rewriting a method so it no longer dereferences a nullable
//! value, and extraction of the rewritten code from a reply.

const EQUALS: &str = "The following Java `equals` method dereferences a value that may be null.
The null checker reports: {error}
Rewrite the method so it compares fields null-safely (for example with `java.util.Objects.equals`)
without changing its behavior for non-null values. Reply with only the complete method in a ```java block.

{method}
";

const TO_STRING: &str = "The following Java `toString` method dereferences a value that may be null.
The null checker reports: {error}
Rewrite the method so null values are rendered as \"null\" instead of throwing.
Reply with only the complete method in a ```java block.

{method}
";

const HASH_CODE: &str = "The following Java `hashCode` method dereferences a value that may be null.
The null checker reports: {error}
Rewrite the method so null fields contribute a constant to the hash (for example with `java.util.Objects.hashCode`).
Reply with only the complete method in a ```java block.

{method}
";

const GENERIC: &str = "The following Java method dereferences a value that may be null.
The null checker reports: {error}
Rewrite the method with the smallest change that guards the dereference, keeping the signature unchanged.
If the dereference is safe, return the method unchanged. Reply with only the complete method in a ```java block.

{method}
";

/// The prompt for a dereference error inside `method_name`.
pub fn dereference_prompt(method_name: &str, method_text: &str, error_message: &str) -> String {
    let template = match method_name {
        "equals" => EQUALS,
        "toString" => TO_STRING,
        "hashCode" => HASH_CODE,
        _ => GENERIC,
    };
    template.replace("{error}", error_message).replace("{method}", method_text)
}

/// The body of the first ```java fenced block, or of the first unlabeled
/// block when there is no java one.
pub fn extract_java_block(reply: &str) -> Option<String> {
    let labeled = find_block(reply, "```java");
    let block = labeled.or_else(|| find_block(reply, "```"))?;
    let code = block.trim();
    (!code.is_empty()).then(|| code.to_string())
}

fn find_block<'a>(reply: &'a str, fence: &str) -> Option<&'a str> {
    let start = reply.find(fence)? + fence.len();
    let rest = &reply[start..];
    // The fence line may carry more info, e.g. "```java title".
    let body_start = rest.find('\n').map_or(rest.len(), |i| i + 1);
    let body = &rest[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}
