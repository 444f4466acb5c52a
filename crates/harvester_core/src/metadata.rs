use std::fmt;

/// The closed set of per-item fields, in output column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetadataField {
    Index,
    ImageFilename,
    Title,
    Creator,
    DateCreated,
    PhysicalDimensions,
    Medium,
    ObjectClassification,
    FullTitle,
    CuratorialArea,
    CreditLine,
    Chronology,
    AccessionNumber,
    PageUrl,
}

const FIELD_COUNT: usize = 14;

impl MetadataField {
    pub const ALL: [MetadataField; FIELD_COUNT] = [
        MetadataField::Index,
        MetadataField::ImageFilename,
        MetadataField::Title,
        MetadataField::Creator,
        MetadataField::DateCreated,
        MetadataField::PhysicalDimensions,
        MetadataField::Medium,
        MetadataField::ObjectClassification,
        MetadataField::FullTitle,
        MetadataField::CuratorialArea,
        MetadataField::CreditLine,
        MetadataField::Chronology,
        MetadataField::AccessionNumber,
        MetadataField::PageUrl,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MetadataField::Index => "Index",
            MetadataField::ImageFilename => "Image Filename",
            MetadataField::Title => "Title",
            MetadataField::Creator => "Creator",
            MetadataField::DateCreated => "Date Created",
            MetadataField::PhysicalDimensions => "Physical Dimensions",
            MetadataField::Medium => "Medium",
            MetadataField::ObjectClassification => "Object Classification",
            MetadataField::FullTitle => "Full Title",
            MetadataField::CuratorialArea => "Curatorial Area",
            MetadataField::CreditLine => "Credit Line",
            MetadataField::Chronology => "Chronology",
            MetadataField::AccessionNumber => "Artwork Accession Number",
            MetadataField::PageUrl => "Page URL",
        }
    }

    /// Fields that may be filled from a label on the item page. The identifying
    /// fields (index, image file, page URL) are owned by the pipeline.
    pub fn is_descriptive(self) -> bool {
        !matches!(
            self,
            MetadataField::Index | MetadataField::ImageFilename | MetadataField::PageUrl
        )
    }

    /// Maps a page label such as `"Date Created"` to its descriptive field.
    pub fn from_page_label(label: &str) -> Option<MetadataField> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .filter(|field| field.is_descriptive())
            .find(|field| field.label().eq_ignore_ascii_case(label))
    }

    fn position(self) -> usize {
        self as usize
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Header row for tabular metadata output.
pub fn metadata_header() -> [&'static str; FIELD_COUNT] {
    MetadataField::ALL.map(MetadataField::label)
}

/// Per-item metadata. Always carries every field; absent values are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataRecord {
    values: [String; FIELD_COUNT],
}

impl MetadataRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// A record with only the identifying fields set.
    pub fn for_item(index: usize, page_url: &str) -> Self {
        let mut record = Self::new();
        record.set(MetadataField::Index, index.to_string());
        record.set(MetadataField::PageUrl, page_url);
        record
    }

    pub fn set(&mut self, field: MetadataField, value: impl Into<String>) {
        self.values[field.position()] = value.into();
    }

    pub fn get(&self, field: MetadataField) -> &str {
        &self.values[field.position()]
    }

    pub fn fields(&self) -> impl Iterator<Item = (MetadataField, &str)> {
        MetadataField::ALL
            .into_iter()
            .map(move |field| (field, self.get(field)))
    }

    /// Values in header order.
    pub fn row(&self) -> &[String] {
        &self.values
    }

    /// Number of descriptive fields that carry a value.
    pub fn populated_descriptive(&self) -> usize {
        self.fields()
            .filter(|(field, value)| field.is_descriptive() && !value.is_empty())
            .count()
    }
}
