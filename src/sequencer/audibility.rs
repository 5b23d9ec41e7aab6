// Mute/solo resolution
// Solo takes priority over mute: while any instrument is soloed, only soloed ones sound

use crate::sequencer::instrument::Instrument;

/// Whether any instrument of the set is soloed
pub fn any_soloed<'a, I>(instruments: I) -> bool
where
    I: IntoIterator<Item = &'a Instrument>,
{
    instruments.into_iter().any(|inst| inst.solo)
}

/// Whether `instrument` should be heard given every instrument of the project
pub fn is_audible<'a, I>(instrument: &Instrument, all_instruments: I) -> bool
where
    I: IntoIterator<Item = &'a Instrument>,
{
    audible_with(instrument, any_soloed(all_instruments))
}

/// Same as [`is_audible`] with the solo scan already done
///
/// The resolver computes `any_solo` once per column instead of once per instrument.
#[inline]
pub fn audible_with(instrument: &Instrument, any_solo: bool) -> bool {
    if any_solo {
        instrument.solo
    } else {
        !instrument.muted
    }
}
