//! Query contract of the system of record.

use serde::{Deserialize, Serialize};

use crate::ids::{ChannelId, TemplateId, VariantId};
use crate::quantities::ChannelQuantities;
use crate::SourceError;

/// Current availability of one variant, one entry per requested channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantStock {
    pub variant_id: VariantId,
    pub template_id: TemplateId,
    pub quantities: ChannelQuantities,
}

/// Read access to authoritative on-hand quantities.
///
/// Every call reflects the state of the system of record at call time.
pub trait StockSource {
    /// Every sales channel stock is published for.
    fn channels(&self) -> Result<Vec<ChannelId>, SourceError>;

    /// Stock of the given variants. Unknown ids are left out of the result.
    fn variant_stock(
        &self,
        ids: &[VariantId],
        channels: &[ChannelId],
    ) -> Result<Vec<VariantStock>, SourceError>;

    /// Stock of every variant belonging to the given templates.
    fn template_stock(
        &self,
        templates: &[TemplateId],
        channels: &[ChannelId],
    ) -> Result<Vec<VariantStock>, SourceError>;

    /// Templates the given variants belonged to before they were removed.
    ///
    /// Ids that are still live or were never known are left out.
    fn retired_templates(&self, ids: &[VariantId]) -> Result<Vec<TemplateId>, SourceError>;

    /// Stock of every variant.
    fn all_variant_stock(&self, channels: &[ChannelId]) -> Result<Vec<VariantStock>, SourceError>;
}

impl<T: StockSource + ?Sized> StockSource for &T {
    fn channels(&self) -> Result<Vec<ChannelId>, SourceError> {
        (**self).channels()
    }

    fn variant_stock(
        &self,
        ids: &[VariantId],
        channels: &[ChannelId],
    ) -> Result<Vec<VariantStock>, SourceError> {
        (**self).variant_stock(ids, channels)
    }

    fn template_stock(
        &self,
        templates: &[TemplateId],
        channels: &[ChannelId],
    ) -> Result<Vec<VariantStock>, SourceError> {
        (**self).template_stock(templates, channels)
    }

    fn retired_templates(&self, ids: &[VariantId]) -> Result<Vec<TemplateId>, SourceError> {
        (**self).retired_templates(ids)
    }

    fn all_variant_stock(&self, channels: &[ChannelId]) -> Result<Vec<VariantStock>, SourceError> {
        (**self).all_variant_stock(channels)
    }
}
