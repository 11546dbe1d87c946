use super::error::Error;

const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*', '\0'];

/// Accept a remote supplied file name only if it is already a bare, portable file name.
///
/// Names are not rewritten: anything that would need sanitizing (directory components of either
/// separator style, `.`/`..`, reserved characters) is rejected so no path is ever built from it.
pub fn sanitize_file_name(name: &str) -> Result<&str, Error> {
	let base = name.rsplit(['/', '\\']).next().unwrap_or_default();

	if base != name
		|| base.is_empty()
		|| base == "."
		|| base == ".."
		|| base.contains(FORBIDDEN_CHARS)
	{
		return Err(Error::UnsafeFileName(name.to_owned()));
	}

	Ok(base)
}
