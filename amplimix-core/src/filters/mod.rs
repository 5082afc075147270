//! Component D: the filter subsystem. A closed tagged enum dispatched by
//! `match` (per `spec.md` §9 — DSP graph nodes are a closed set, not an
//! extension point, unlike codecs).

mod biquad;
mod dc_removal;
mod equalizer;
mod flanger;
mod freeverb;

pub use biquad::BiquadType;

use biquad::BiquadFilter;
use dc_removal::DcRemovalFilter;
use equalizer::EqualizerFilter;
use flanger::FlangerFilter;
use freeverb::FreeverbFilter;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterKind {
    Biquad(BiquadKindTag),
    DcRemoval,
    Equalizer,
    Flanger,
    Freeverb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BiquadKindTag {
    LowPass,
    HighPass,
    BandPass,
    Peak,
    Notch,
    LowShelf,
    HighShelf,
}

impl From<BiquadKindTag> for BiquadType {
    fn from(t: BiquadKindTag) -> Self {
        match t {
            BiquadKindTag::LowPass => BiquadType::LowPass,
            BiquadKindTag::HighPass => BiquadType::HighPass,
            BiquadKindTag::BandPass => BiquadType::BandPass,
            BiquadKindTag::Peak => BiquadType::Peak,
            BiquadKindTag::Notch => BiquadType::Notch,
            BiquadKindTag::LowShelf => BiquadType::LowShelf,
            BiquadKindTag::HighShelf => BiquadType::HighShelf,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Filter {
    Biquad(BiquadFilter),
    DcRemoval(DcRemovalFilter),
    Equalizer(EqualizerFilter),
    Flanger(FlangerFilter),
    Freeverb(FreeverbFilter),
}

impl Filter {
    pub fn new(kind: FilterKind, sample_rate: u32, channels: u16) -> Self {
        match kind {
            FilterKind::Biquad(t) => Filter::Biquad(BiquadFilter::new(t.into(), sample_rate, channels)),
            FilterKind::DcRemoval => Filter::DcRemoval(DcRemovalFilter::new(channels)),
            FilterKind::Equalizer => Filter::Equalizer(EqualizerFilter::new(sample_rate, channels)),
            FilterKind::Flanger => Filter::Flanger(FlangerFilter::new(sample_rate, channels)),
            FilterKind::Freeverb => Filter::Freeverb(FreeverbFilter::new(channels, 0.5, 0.5)),
        }
    }

    pub fn kind(&self) -> FilterKind {
        match self {
            Filter::Biquad(f) => FilterKind::Biquad(match f.filter_type_tag() {
                BiquadType::LowPass => BiquadKindTag::LowPass,
                BiquadType::HighPass => BiquadKindTag::HighPass,
                BiquadType::BandPass => BiquadKindTag::BandPass,
                BiquadType::Peak => BiquadKindTag::Peak,
                BiquadType::Notch => BiquadKindTag::Notch,
                BiquadType::LowShelf => BiquadKindTag::LowShelf,
                BiquadType::HighShelf => BiquadKindTag::HighShelf,
            }),
            Filter::DcRemoval(_) => FilterKind::DcRemoval,
            Filter::Equalizer(_) => FilterKind::Equalizer,
            Filter::Flanger(_) => FilterKind::Flanger,
            Filter::Freeverb(_) => FilterKind::Freeverb,
        }
    }

    pub fn process(&mut self, samples: &mut [f32], channels: u16) {
        match self {
            Filter::Biquad(f) => f.process(samples, channels),
            Filter::DcRemoval(f) => f.process(samples, channels),
            Filter::Equalizer(f) => f.process(samples, channels),
            Filter::Flanger(f) => f.process(samples, channels),
            Filter::Freeverb(f) => f.process(samples, channels),
        }
    }
}
