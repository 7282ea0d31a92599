/// Outcome of a rewrite step: `Yes` carries a rebuilt node, `No` hands back
/// the very node that was passed in, so callers can keep sharing it.
#[derive(Debug, PartialEq, Clone)]
pub enum Transformed<T> {
    Yes(T),
    No(T),
}

impl<T> Transformed<T> {
    pub fn into_inner(self) -> T {
        match self {
            Transformed::Yes(node) | Transformed::No(node) => node,
        }
    }

    pub fn is_yes(&self) -> bool {
        matches!(self, Transformed::Yes(_))
    }
}
