use std::fmt;
use std::str::FromStr;

use crate::error::CommandError;

/// Content-derived hint about where an image belongs in a two-page spread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum PageType {
    #[default]
    Normal,
    /// Wants to be the left half of a spread.
    ForceLeft,
    /// Wants to be the right half of a spread.
    ForceRight,
    /// Always shown on its own.
    StandaloneWide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum ViewMode {
    /// Two-page spreads read right to left.
    #[default]
    Manga,
    Single,
    Vertical,
}

impl ViewMode {
    pub fn name(self) -> &'static str {
        match self {
            ViewMode::Manga => "manga",
            ViewMode::Single => "single",
            ViewMode::Vertical => "vertical",
        }
    }

    pub fn pairs_pages(self) -> bool {
        self == ViewMode::Manga
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ViewMode {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manga" => Ok(ViewMode::Manga),
            "single" => Ok(ViewMode::Single),
            "vertical" => Ok(ViewMode::Vertical),
            other => Err(CommandError::UnknownMode(other.to_string())),
        }
    }
}

/// Maps every position of a tag to the position of the first image on the
/// same visual page.
///
/// In manga mode the tag is split into runs separated by standalone-wide
/// images. Each run is paired two by two, either starting at its first image
/// or leaving the first image alone. The choice follows a score fed by the
/// forced-side images of the run (and by the parity of the run length when
/// the run ends on a wide image), flipped by every `invert` set inside it.
/// The page start is the right-hand image of a spread.
pub fn compute_page_starts(types: &[PageType], inverts: &[bool], mode: ViewMode) -> Vec<usize> {
    let len = types.len();
    let mut starts: Vec<usize> = (0..len).collect();
    if !mode.pairs_pages() {
        return starts;
    }

    let mut run_start = 0;
    let mut score: i32 = 0;
    let mut invert_alone = false;

    for i in 0..=len {
        let odd = (i - run_start) % 2 == 1;

        if i == len || types[i] == PageType::StandaloneWide {
            if i < len {
                score += if odd { 1 } else { -1 };
            }
            let first_alone = (score > 0) ^ invert_alone;
            pair_run(&mut starts[run_start..i], run_start, first_alone);

            run_start = i + 1;
            score = 0;
            invert_alone = false;
            continue;
        }

        match types[i] {
            PageType::ForceRight => score += if odd { 1 } else { -1 },
            PageType::ForceLeft => score += if odd { -1 } else { 1 },
            _ => {}
        }

        if inverts.get(i).copied().unwrap_or(false) {
            invert_alone = !invert_alone;
        }
    }

    starts
}

fn pair_run(run: &mut [usize], offset: usize, first_alone: bool) {
    let mut page_start = offset;
    for (k, slot) in run.iter_mut().enumerate() {
        if k == 0 || (k % 2 == 1) == first_alone {
            page_start = offset + k;
        }
        *slot = page_start;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;
    use super::PageType::{ForceLeft as L, ForceRight as R, Normal as N, StandaloneWide as W};

    fn manga(types: &[PageType]) -> Vec<usize> {
        compute_page_starts(types, &vec![false; types.len()], ViewMode::Manga)
    }

    #[test_case(&[], &[] ; "empty")]
    #[test_case(&[N], &[0] ; "single image")]
    #[test_case(&[N, N, N, N], &[0, 0, 2, 2] ; "even normals pair from zero")]
    #[test_case(&[N, N, N, N, N], &[0, 0, 2, 2, 4] ; "odd normals leave last alone")]
    #[test_case(&[N, N, W, R], &[0, 0, 2, 3] ; "wide splits runs")]
    #[test_case(&[N, W, N, N], &[0, 1, 2, 2] ; "odd run before wide isolates first")]
    #[test_case(&[N, N, N, W], &[0, 1, 1, 3] ; "three before wide leave cover alone")]
    #[test_case(&[W, N, N], &[0, 1, 1] ; "wide at start")]
    #[test_case(&[N, R, N, N], &[0, 1, 1, 3] ; "right page at odd offset pulls parity")]
    #[test_case(&[L, N, N], &[0, 1, 1] ; "left page at even offset stands alone")]
    #[test_case(&[R, N, N, N], &[0, 0, 2, 2] ; "right page at even offset keeps parity")]
    #[test_case(&[W, W], &[0, 1] ; "consecutive wides")]
    fn manga_page_starts(types: &[PageType], expected: &[usize]) {
        assert_eq!(manga(types), expected);
    }

    #[test_case(ViewMode::Single ; "single")]
    #[test_case(ViewMode::Vertical ; "vertical")]
    fn unpaired_modes_are_identity(mode: ViewMode) {
        let types = [N, N, W, L, R];
        assert_eq!(compute_page_starts(&types, &[false; 5], mode), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn invert_flips_the_run() {
        let types = [N, N, N, N];
        assert_eq!(manga(&types), vec![0, 0, 2, 2]);

        let inverted = compute_page_starts(&types, &[false, false, true, false], ViewMode::Manga);
        assert_eq!(inverted, vec![0, 1, 1, 3]);

        let twice = compute_page_starts(&types, &[true, false, true, false], ViewMode::Manga);
        assert_eq!(twice, vec![0, 0, 2, 2]);
    }

    #[test]
    fn invert_stays_inside_its_run() {
        let types = [N, N, W, N, N];
        let starts = compute_page_starts(&types, &[true, false, false, false, false], ViewMode::Manga);
        // first run: score -1 from the even-length boundary, flipped -> first alone
        assert_eq!(starts, vec![0, 1, 2, 3, 3]);
    }

    #[test]
    fn invert_on_wide_is_ignored() {
        let types = [N, N, W, N, N];
        let starts = compute_page_starts(&types, &[false, false, true, false, false], ViewMode::Manga);
        assert_eq!(starts, manga(&types));
    }

    #[test]
    fn pages_are_well_formed_for_every_small_tag() {
        let all = [N, L, R, W];
        for len in 0..=6u32 {
            for code in 0..4usize.pow(len) {
                let types: Vec<PageType> = (0..len as usize)
                    .map(|k| all[(code / 4usize.pow(k as u32)) % 4])
                    .collect();
                let starts = manga(&types);

                for (i, &start) in starts.iter().enumerate() {
                    assert!(start == i || start + 1 == i, "{types:?} -> {starts:?}");
                    if start + 1 == i {
                        assert_eq!(starts[start], start, "{types:?} -> {starts:?}");
                        assert_ne!(types[i], W);
                        assert_ne!(types[start], W);
                    }
                    if types[i] == W {
                        assert_eq!(start, i);
                    }
                }
            }
        }
    }

    #[test]
    fn wide_resets_parity_for_following_run() {
        let before = manga(&[N, N, N, W, N, N]);
        let after = manga(&[N, W, N, N]);
        assert_eq!(&before[4..], &[4, 4]);
        assert_eq!(&after[2..], &[2, 2]);
    }

    #[test]
    fn mode_round_trips_through_names() {
        for mode in [ViewMode::Manga, ViewMode::Single, ViewMode::Vertical] {
            assert_eq!(mode.to_string().parse::<ViewMode>(), Ok(mode));
        }
        assert_eq!(
            "scroll".parse::<ViewMode>(),
            Err(CommandError::UnknownMode("scroll".into()))
        );
    }
}
