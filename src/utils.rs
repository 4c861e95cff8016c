//! Small helpers for building command argument lists.

/// Convert any iterable of displayable items into owned argv strings.
pub fn to_string_vec<T, I>(items: I) -> Vec<String>
where
    T: ToString,
    I: IntoIterator<Item = T>,
{
    items.into_iter().map(|item| item.to_string()).collect()
}

/// `args!["-crop", geometry, "txt:-"]` builds a `Vec<String>` argv.
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        $crate::utils::to_string_vec([$($item),*])
    };
}
