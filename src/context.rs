use crate::store::{ChronoDateFormatter, DataSource, DateFormatter, EnglishStrings, Id, Localizer};

/// Who is looking at the rendered text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Authenticated(Id),
    Anonymous,
}

impl Viewer {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Viewer::Authenticated(_))
    }

    pub fn id(&self) -> Option<Id> {
        match self {
            Viewer::Authenticated(id) => Some(*id),
            Viewer::Anonymous => None,
        }
    }
}

/// Ambient data for one filtering session.
///
/// Passed explicitly into every resolution call and never mutated while a
/// pass runs.
pub struct ResolutionContext<'a> {
    pub viewer: Viewer,
    /// Current course, if the text is rendered inside one.
    pub scope: Option<Id>,
    pub data: &'a dyn DataSource,
    pub strings: Box<dyn Localizer + 'a>,
    pub dates: Box<dyn DateFormatter + 'a>,
}

impl<'a> ResolutionContext<'a> {
    /// Context with built-in English strings and UTC date formatting.
    pub fn new(viewer: Viewer, scope: Option<Id>, data: &'a dyn DataSource) -> Self {
        Self {
            viewer,
            scope,
            data,
            strings: Box::new(EnglishStrings::new()),
            dates: Box::new(ChronoDateFormatter::default()),
        }
    }

    pub fn with_strings(mut self, strings: impl Localizer + 'a) -> Self {
        self.strings = Box::new(strings);
        self
    }

    pub fn with_dates(mut self, dates: impl DateFormatter + 'a) -> Self {
        self.dates = Box::new(dates);
        self
    }
}
