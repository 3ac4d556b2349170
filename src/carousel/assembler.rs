//! Slide-by-slide carousel assembly.
//!
//! Slides are processed strictly in order. For each one the assembler asks the
//! candidate source for images, drops URLs an earlier slide already used, lets
//! the ranker pick one, downloads it and rejects it if its fingerprint matches
//! an image already committed to this carousel. Any failure skips that slide
//! only; the output keeps input order but may be shorter than the input.

use crate::carousel::acquire::{ImageAcquirer, ImageSource};
use crate::carousel::compositor::{Compositor, Typesetter};
use crate::carousel::dedup::{self, DuplicatePolicy, UsedSet};
use crate::carousel::fingerprint::Fingerprint;
use crate::error::{CarouselError, CarouselResult};
use crate::models::{CandidateImage, ComposedSlide, RenderedSlide, SlideSpec};
use crate::utils::{slugify_keyword, unique_path};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Instant;
use tokio::fs;
use tracing::{info, instrument, warn};

/// Supplies image candidates for a search keyword.
///
/// Failures are the implementor's business; an empty list simply skips the slide.
pub trait CandidateSource {
    async fn find_candidates(&self, keyword: &str) -> Vec<CandidateImage>;
}

/// Picks the best candidate for a keyword, or none.
///
/// `used` holds the fingerprints of slides already committed to this carousel.
pub trait CandidateRanker {
    async fn rank_candidate(
        &self,
        candidates: &[CandidateImage],
        keyword: &str,
        used: &BTreeSet<Fingerprint>,
    ) -> Option<CandidateImage>;
}

/// Owns the per-run used sets and drives the per-slide steps.
#[derive(Debug)]
pub struct CarouselAssembler<'a, C, R, S> {
    candidates: &'a C,
    ranker: &'a R,
    acquirer: &'a ImageAcquirer<S>,
    policy: DuplicatePolicy,
}

impl<'a, C, R, S> CarouselAssembler<'a, C, R, S>
where
    C: CandidateSource,
    R: CandidateRanker,
    S: ImageSource,
{
    pub fn new(
        candidates: &'a C,
        ranker: &'a R,
        acquirer: &'a ImageAcquirer<S>,
        policy: DuplicatePolicy,
    ) -> Self {
        Self {
            candidates,
            ranker,
            acquirer,
            policy,
        }
    }

    /// Turn slide specs into rendered slides with unique images.
    ///
    /// Never fails: every per-slide error is logged and the slide is dropped.
    /// Zero slides is a valid result.
    #[instrument(level = "info", skip_all, fields(slides = slides.len()))]
    pub async fn assemble(&self, slides: &[SlideSpec]) -> Vec<RenderedSlide> {
        let start = Instant::now();
        let mut used = UsedSet::new();
        let mut rendered = Vec::with_capacity(slides.len());

        for (index, slide) in slides.iter().enumerate() {
            let keyword = slide.image_search_keyword.as_str();
            match self.assemble_one(slide, &mut used).await {
                Ok(done) => rendered.push(done),
                Err(e) => warn!(slide = index + 1, %keyword, reason = %e, "Skipping slide"),
            }
        }

        info!(
            requested = slides.len(),
            assembled = rendered.len(),
            unique_images = used.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Carousel assembled"
        );
        rendered
    }

    async fn assemble_one(
        &self,
        slide: &SlideSpec,
        used: &mut UsedSet,
    ) -> CarouselResult<RenderedSlide> {
        let keyword = slide.image_search_keyword.as_str();

        let skip = |why: &str| CarouselError::NoEligibleCandidate(format!("{keyword} ({why})"));

        let found = self.candidates.find_candidates(keyword).await;
        if found.is_empty() {
            return Err(skip("search returned nothing"));
        }

        let fresh = dedup::filter(&found, used.urls());
        if fresh.is_empty() {
            return Err(skip("all candidates already used"));
        }

        let chosen = self
            .ranker
            .rank_candidate(&fresh, keyword, used.fingerprints())
            .await
            .ok_or_else(|| skip("ranker declined"))?;

        let acquired = self.acquirer.acquire(&chosen.source_url, keyword).await?;

        if dedup::is_duplicate(acquired.fingerprint, used.fingerprints(), self.policy) {
            self.acquirer.discard(&acquired).await;
            let why = format!("image {} duplicates an earlier slide", acquired.fingerprint);
            return Err(skip(why.as_str()));
        }

        used.commit(&chosen.source_url, acquired.fingerprint);
        Ok(RenderedSlide {
            heading: slide.heading.clone(),
            body_text: slide.body_text.clone(),
            image_search_keyword: slide.image_search_keyword.clone(),
            source_url: chosen.source_url,
            fingerprint: acquired.fingerprint,
            image_path: acquired.path,
        })
    }
}

/// Render every assembled slide into `out_dir` as `output_<keyword>.jpg`.
///
/// Slides whose staged image cannot be read or decoded are skipped.
#[instrument(level = "info", skip_all, fields(slides = slides.len(), out = %out_dir.display()))]
pub async fn compose_slides<T: Typesetter>(
    slides: &[RenderedSlide],
    compositor: &Compositor<'_, T>,
    out_dir: &Path,
) -> CarouselResult<Vec<ComposedSlide>> {
    fs::create_dir_all(out_dir).await?;
    let mut composed = Vec::with_capacity(slides.len());

    for (index, slide) in slides.iter().enumerate() {
        match compose_one(slide, compositor, out_dir).await {
            Ok(done) => composed.push(done),
            Err(e) => warn!(
                slide = index + 1,
                keyword = %slide.image_search_keyword,
                reason = %e,
                "Skipping slide at composition"
            ),
        }
    }

    info!(composed = composed.len(), "Slides composed");
    Ok(composed)
}

async fn compose_one<T: Typesetter>(
    slide: &RenderedSlide,
    compositor: &Compositor<'_, T>,
    out_dir: &Path,
) -> CarouselResult<ComposedSlide> {
    let base = fs::read(&slide.image_path).await?;
    let jpeg = compositor.render(&base, &slide.heading, &slide.body_text)?;

    let stem = format!("output_{}", slugify_keyword(&slide.image_search_keyword));
    let output_path = unique_path(out_dir, &stem, "jpg").await?;
    fs::write(&output_path, jpeg).await?;

    Ok(ComposedSlide {
        heading: slide.heading.clone(),
        image_search_keyword: slide.image_search_keyword.clone(),
        output_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carousel::acquire::tests::MemorySource;
    use crate::carousel::compositor::tests::BlockTypesetter;
    use crate::carousel::fingerprint::tests::{encode_jpeg, synthetic_photo};
    use crate::config::RenderSettings;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Keyword -> fixed candidate list.
    #[derive(Default)]
    struct StubCandidates {
        by_keyword: HashMap<String, Vec<CandidateImage>>,
    }

    impl StubCandidates {
        fn with(mut self, keyword: &str, urls: &[&str]) -> Self {
            let list = urls
                .iter()
                .map(|u| CandidateImage {
                    source_url: u.to_string(),
                    alt_text: format!("photo for {keyword}"),
                })
                .collect();
            self.by_keyword.insert(keyword.to_string(), list);
            self
        }
    }

    impl CandidateSource for StubCandidates {
        async fn find_candidates(&self, keyword: &str) -> Vec<CandidateImage> {
            self.by_keyword.get(keyword).cloned().unwrap_or_default()
        }
    }

    /// Always takes the first offered candidate and records what it was offered.
    #[derive(Default)]
    struct FirstRanker {
        offered: Mutex<Vec<Vec<String>>>,
        used_sizes: Mutex<Vec<usize>>,
    }

    impl CandidateRanker for FirstRanker {
        async fn rank_candidate(
            &self,
            candidates: &[CandidateImage],
            _keyword: &str,
            used: &BTreeSet<Fingerprint>,
        ) -> Option<CandidateImage> {
            self.offered
                .lock()
                .unwrap()
                .push(candidates.iter().map(|c| c.source_url.clone()).collect());
            self.used_sizes.lock().unwrap().push(used.len());
            candidates.first().cloned()
        }
    }

    struct NoRanker;

    impl CandidateRanker for NoRanker {
        async fn rank_candidate(
            &self,
            _: &[CandidateImage],
            _: &str,
            _: &BTreeSet<Fingerprint>,
        ) -> Option<CandidateImage> {
            None
        }
    }

    fn slide_spec(keyword: &str) -> SlideSpec {
        SlideSpec {
            heading: format!("About {keyword}"),
            body_text: format!("Some words on {keyword}."),
            image_search_keyword: keyword.to_string(),
        }
    }

    fn photo(seed: u32) -> Vec<u8> {
        encode_jpeg(&synthetic_photo(seed, 64, 64), 90)
    }

    fn five_specs() -> Vec<SlideSpec> {
        ["k1", "k2", "k3", "k4", "k5"].into_iter().map(slide_spec).collect()
    }

    #[tokio::test]
    async fn test_five_unique_slides_keep_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = MemorySource::default();
        let mut candidates = StubCandidates::default();
        for i in 1..=5u32 {
            let url = format!("https://img/{i}");
            bytes = bytes.with(&url, photo(i));
            candidates = candidates.with(&format!("k{i}"), &[url.as_str()]);
        }
        let acquirer = ImageAcquirer::new(bytes, dir.path());
        let ranker = FirstRanker::default();
        let assembler =
            CarouselAssembler::new(&candidates, &ranker, &acquirer, DuplicatePolicy::exact());

        let slides = assembler.assemble(&five_specs()).await;

        let keywords: Vec<_> = slides.iter().map(|s| s.image_search_keyword.as_str()).collect();
        assert_eq!(keywords, ["k1", "k2", "k3", "k4", "k5"]);
        let fps: BTreeSet<_> = slides.iter().map(|s| s.fingerprint).collect();
        let urls: BTreeSet<_> = slides.iter().map(|s| s.source_url.clone()).collect();
        assert_eq!(fps.len(), 5);
        assert_eq!(urls.len(), 5);
        assert_eq!(*ranker.used_sizes.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_identical_pixels_under_new_url_skip_slide() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = MemorySource::default();
        let mut candidates = StubCandidates::default();
        for i in 1..=5u32 {
            let url = format!("https://img/{i}");
            // slide 3 re-hosts slide 1's picture
            let seed = if i == 3 { 1 } else { i };
            bytes = bytes.with(&url, photo(seed));
            candidates = candidates.with(&format!("k{i}"), &[url.as_str()]);
        }
        let acquirer = ImageAcquirer::new(bytes, dir.path());
        let ranker = FirstRanker::default();
        let assembler =
            CarouselAssembler::new(&candidates, &ranker, &acquirer, DuplicatePolicy::exact());

        let slides = assembler.assemble(&five_specs()).await;

        let keywords: Vec<_> = slides.iter().map(|s| s.image_search_keyword.as_str()).collect();
        assert_eq!(keywords, ["k1", "k2", "k4", "k5"]);
        // discarded download for slide 3 is gone, the four kept ones stay
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 4);
        assert!(slides.iter().all(|s| s.image_path.exists()));
    }

    #[tokio::test]
    async fn test_used_url_filtered_before_download() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = MemorySource::default()
            .with("https://img/shared", photo(1))
            .with("https://img/fresh", photo(2))
            .with("https://img/third", photo(3));
        let candidates = StubCandidates::default()
            .with("a", &["https://img/shared"])
            .with("b", &["https://img/shared", "https://img/fresh"])
            .with("c", &["https://img/third"]);
        let acquirer = ImageAcquirer::new(bytes, dir.path());
        let ranker = FirstRanker::default();
        let assembler =
            CarouselAssembler::new(&candidates, &ranker, &acquirer, DuplicatePolicy::exact());

        let slides = assembler.assemble(&[slide_spec("a"), slide_spec("b"), slide_spec("c")]).await;

        assert_eq!(slides.len(), 3);
        assert_eq!(slides[1].source_url, "https://img/fresh");
        assert_eq!(ranker.offered.lock().unwrap()[1], vec!["https://img/fresh".to_string()]);
        let requested = acquirer_requests(&acquirer);
        assert_eq!(requested.iter().filter(|u| *u == "https://img/shared").count(), 1);
    }

    fn acquirer_requests(acquirer: &ImageAcquirer<MemorySource>) -> Vec<String> {
        acquirer.source().requested()
    }

    #[tokio::test]
    async fn test_empty_search_yields_empty_carousel() {
        let dir = tempfile::tempdir().unwrap();
        let acquirer = ImageAcquirer::new(MemorySource::default(), dir.path());
        let candidates = StubCandidates::default();
        let ranker = FirstRanker::default();
        let assembler =
            CarouselAssembler::new(&candidates, &ranker, &acquirer, DuplicatePolicy::exact());

        let slides = assembler.assemble(&five_specs()).await;

        assert!(slides.is_empty());
        assert!(ranker.offered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ranker_declining_skips_slide() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = MemorySource::default().with("https://img/1", photo(1));
        let candidates = StubCandidates::default().with("k1", &["https://img/1"]);
        let acquirer = ImageAcquirer::new(bytes, dir.path());
        let assembler =
            CarouselAssembler::new(&candidates, &NoRanker, &acquirer, DuplicatePolicy::exact());

        assert!(assembler.assemble(&[slide_spec("k1")]).await.is_empty());
        assert!(acquirer.source().requested().is_empty());
    }

    #[tokio::test]
    async fn test_failed_download_skips_only_that_slide() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = MemorySource::default()
            .with("https://img/1", photo(1))
            .with("https://img/bad", b"garbage".to_vec());
        let candidates = StubCandidates::default()
            .with("k1", &["https://img/1"])
            .with("k2", &["https://img/missing"])
            .with("k3", &["https://img/bad"]);
        let acquirer = ImageAcquirer::new(bytes, dir.path());
        let ranker = FirstRanker::default();
        let assembler =
            CarouselAssembler::new(&candidates, &ranker, &acquirer, DuplicatePolicy::exact());

        let specs = [slide_spec("k1"), slide_spec("k2"), slide_spec("k3")];
        let slides = assembler.assemble(&specs).await;

        assert_eq!(slides.len(), 1);
        assert_eq!(slides[0].image_search_keyword, "k1");
    }

    #[tokio::test]
    async fn test_compose_writes_output_files_and_skips_broken_inputs() {
        let staging = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let good = staging.path().join("good.jpg");
        std::fs::write(&good, photo(4)).unwrap();
        let broken = staging.path().join("broken.jpg");
        std::fs::write(&broken, b"not a jpeg").unwrap();

        let slide = |keyword: &str, path: &Path| RenderedSlide {
            heading: "Heading".into(),
            body_text: "Body".into(),
            image_search_keyword: keyword.into(),
            source_url: format!("https://img/{keyword}"),
            fingerprint: Fingerprint::from_u64(1),
            image_path: path.to_path_buf(),
        };
        let slides = vec![
            slide("city lights", &good),
            slide("oops", &broken),
            slide("city lights", &good),
        ];

        let settings = RenderSettings::default();
        let compositor = Compositor::new(&BlockTypesetter, &settings);
        let composed = compose_slides(&slides, &compositor, out.path()).await.unwrap();

        assert_eq!(composed.len(), 2);
        assert_eq!(composed[0].output_path, out.path().join("output_city_lights.jpg"));
        assert_ne!(composed[0].output_path, composed[1].output_path);
        assert!(composed.iter().all(|c| c.output_path.exists()));
    }
}
