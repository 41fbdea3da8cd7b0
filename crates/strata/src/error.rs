pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no arrangeable elements are selected")]
    EmptySelection,

    #[error("duplicate element id: {id}")]
    DuplicateElement { id: String },

    #[error("element {id} has an undefined parent frame: {parent}")]
    UndefinedParent { id: String, parent: String },

    #[error("parent frame chain of element {id} is cyclic")]
    CyclicParent { id: String },

    #[error("link {from}[{from_socket}] -> {to}[{to_socket}] does not reference existing sockets")]
    DanglingLink {
        from: String,
        from_socket: usize,
        to: String,
        to_socket: usize,
    },

    #[error("links between the selected elements form a cycle through {id}")]
    CyclicLinks { id: String },

    #[error("invalid layout configuration: {message}")]
    InvalidConfig { message: String },

    #[error("no active output among the elements")]
    NoActiveOutput,

    #[error("no valid active element is selected")]
    NoActiveNode,

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Recovered conditions reported alongside an otherwise successful layout.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Diagnostic {
    /// A bend point on a link had no valid position and was dropped.
    RoutingDegenerate { from: String, to: String },
}
