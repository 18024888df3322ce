//! MaungQL keywords
//!
//! Every keyword role accepts a set of bilingual synonyms. Matching is
//! case-insensitive and depends on where the word appears, so a word such
//! as `JADI` can be both the UPDATE `SET` word and the replication verb.

/// A keyword role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    // ========== Statement verbs ==========
    Create,
    Insert,
    Select,
    Update,
    Delete,
    Index,
    Search,
    Begin,
    Commit,
    Rollback,
    Become,

    // ========== Create targets ==========
    Table,
    View,
    Trigger,
    FullText,

    // ========== Clauses ==========
    From,
    Databases,
    Set,
    Where,
    And,
    Or,
    Contains,
    As,
    When,
    TriggerOn,
    Do,
    On,
    For,

    // ========== Joins ==========
    Inner,
    Left,
    Right,
    Full,
    Join,

    // ========== Grouping & ordering ==========
    Group,
    By,
    Having,
    HavingFiller,
    Order,
    Asc,
    Desc,
    Limit,
    Offset,

    // ========== Replication ==========
    Master,
    Replica,
    Of,
}

impl Keyword {
    /// Accepted spellings, uppercase
    pub fn synonyms(&self) -> &'static [&'static str] {
        match self {
            Keyword::Create => &["DAMEL", "BIKIN", "NYIEUN", "SCHEMA", "CREATE"],
            Keyword::Insert => &["SIMPEN", "TENDEUN", "INSERT"],
            Keyword::Select => &["TINGALI", "TENJO", "SELECT"],
            Keyword::Update => &["OMEAN", "ROBIH", "UPDATE"],
            Keyword::Delete => &["MICEUN", "PICEUN", "DELETE"],
            Keyword::Index => &["TANDAIN", "TANDAAN", "TAWISAN", "INDEX"],
            Keyword::Search => &["KOREHAN", "SEARCH"],
            Keyword::Begin => &["MIMITIAN", "BEGIN"],
            Keyword::Commit => &["JADIKEUN", "COMMIT"],
            Keyword::Rollback => &["BATALKEUN", "ROLLBACK"],
            Keyword::Become => &["JADI", "JANTEN", "BECOME"],

            Keyword::Table => &["CREATE", "TABEL", "TABLE"],
            Keyword::View => &["KACA", "VIEW"],
            Keyword::Trigger => &["JARAMBAH", "TRIGGER"],
            Keyword::FullText => &["INDEKS_TEKS", "FULLTEXT"],

            Keyword::From => &["TI", "FROM"],
            Keyword::Databases => &["PANGKAL", "DATABASES"],
            Keyword::Set => &["JADI", "JANTEN", "SET"],
            Keyword::Where => &["DIMANA", "WHERE"],
            Keyword::And => &["SARENG", "AND"],
            Keyword::Or => &["ATAWA", "OR"],
            Keyword::Contains => &["JIGA", "LIKE"],
            Keyword::As => &["TINA", "AS"],
            Keyword::When => &["WAKTU", "WHEN"],
            Keyword::TriggerOn => &["PADA", "ON"],
            Keyword::Do => &["LAKUKAN", "DO"],
            Keyword::On => &["DINA", "ON"],
            Keyword::For => &["MILARI", "FOR"],

            Keyword::Inner => &["HIJIKEUN", "INNER"],
            Keyword::Left => &["KENCA", "LEFT"],
            Keyword::Right => &["KATUHU", "RIGHT"],
            Keyword::Full => &["PINUH", "FULL"],
            Keyword::Join => &["GABUNG", "JOIN"],

            Keyword::Group => &["KUMPULKEUN", "GROUP"],
            Keyword::By => &["DUMASAR", "BY"],
            Keyword::Having => &["MUN", "HAVING"],
            Keyword::HavingFiller => &["SYARATNA"],
            Keyword::Order => &["RUNTUYKEUN", "ORDER"],
            Keyword::Asc => &["TI_HANDAP", "NAEK", "ASC"],
            Keyword::Desc => &["TI_LUHUR", "TURUN", "DESC"],
            Keyword::Limit => &["SAKADAR", "LIMIT"],
            Keyword::Offset => &["LIWATAN", "OFFSET"],

            Keyword::Master => &["INDUNG", "MASTER"],
            Keyword::Replica => &["ANAK", "REPLICA"],
            Keyword::Of => &["NGINTIL", "OF"],
        }
    }

    /// Check whether `word` spells this keyword
    pub fn matches(&self, word: &str) -> bool {
        let upper = word.to_uppercase();
        self.synonyms().iter().any(|s| *s == upper)
    }

    /// Canonical English spelling, used in error messages
    pub fn canonical(&self) -> &'static str {
        let synonyms = self.synonyms();
        synonyms[synonyms.len() - 1]
    }
}

/// Words that start a SELECT clause after the source table
pub const CLAUSE_STARTS: &[Keyword] = &[
    Keyword::Where,
    Keyword::Inner,
    Keyword::Left,
    Keyword::Right,
    Keyword::Full,
    Keyword::Join,
    Keyword::Group,
    Keyword::Having,
    Keyword::Order,
    Keyword::Limit,
    Keyword::Offset,
];

/// Check whether `word` starts a SELECT clause
pub fn is_clause_start(word: &str) -> bool {
    CLAUSE_STARTS.iter().any(|kw| kw.matches(word))
}
