//! Control character classification for inbound and outbound lines.
//!
//! Chat text may carry CTCP and mIRC-style formatting codes. Everything
//! else in the C0 range, apart from the CR/LF line delimiters and NUL, is
//! rejected by the strict line codec.

/// Whether a character is a text formatting code.
///
/// ```
/// use shardchat_proto::format::is_format_code;
///
/// assert!(is_format_code('\x01')); // CTCP
/// assert!(is_format_code('\x02')); // bold
/// assert!(!is_format_code('a'));
/// ```
#[inline]
pub fn is_format_code(ch: char) -> bool {
    matches!(
        ch,
        '\x01' | '\x02' | '\x03' | '\x04' | '\x0F' | '\x11' | '\x16' | '\x1D' | '\x1E' | '\x1F'
    )
}

/// Whether a character is not allowed inside a line.
///
/// BEL is always illegal. Other control characters are illegal unless they
/// are CR, LF, NUL or a formatting code.
#[inline]
pub fn is_illegal_control_char(ch: char) -> bool {
    if ch == '\x07' {
        return true;
    }
    ch.is_control() && ch != '\r' && ch != '\n' && ch != '\0' && !is_format_code(ch)
}
