//! Static adapter registry.
//!
//! Adapters are registered at build time and looked up by source key. The
//! `script_path` stored in the source registry is a human-readable locator
//! for the adapter module, kept for admin display and diagnostics.

use std::sync::Arc;

use newswire_store::SourceSeed;

use crate::adapter::ScraperAdapter;
use crate::adapters::*;

pub fn builtin_adapters() -> Vec<Arc<dyn ScraperAdapter>> {
    vec![
        // game
        Arc::new(chuapp::Chuapp),
        Arc::new(gamedeveloper::GameDeveloper),
        Arc::new(gamesindustry::GamesIndustry),
        Arc::new(deconstructor_of_fun::DeconstructorOfFun),
        Arc::new(naavik::NaavikDigest),
        Arc::new(niko_partners::NikoPartners),
        Arc::new(sensortower::SensorTower),
        Arc::new(youxituoluo::Youxituoluo),
        // game video channels
        Arc::new(yt_channels::YtGameDiscoverCo),
        Arc::new(yt_channels::YtGdcTalks),
        // tech
        Arc::new(ruanyifeng::Ruanyifeng),
        Arc::new(semianalysis::SemiAnalysis),
        Arc::new(thegradient::TheGradient),
        Arc::new(jiqizhixin::Jiqizhixin),
        Arc::new(qbitai::Qbitai),
        Arc::new(stratechery::Stratechery),
        Arc::new(huggingface_papers::HuggingfacePapers),
        Arc::new(openai_research::OpenAiResearch),
        Arc::new(arxiv_cs_ai::ArxivCsAi),
        Arc::new(deepmind_blog::DeepmindBlog),
        // humanities
        Arc::new(guancha::GuanchaMainNews),
        Arc::new(philomag::Philomag),
    ]
}

pub fn find(key: &str) -> Option<Arc<dyn ScraperAdapter>> {
    builtin_adapters()
        .into_iter()
        .find(|adapter| adapter.descriptor().source == key)
}

/// First-run registration data for the source registry.
pub fn source_seeds() -> Vec<SourceSeed> {
    builtin_adapters()
        .iter()
        .map(|adapter| {
            let d = adapter.descriptor();
            SourceSeed {
                key: d.source.to_string(),
                label: d.label.to_string(),
                category_key: d.category.to_string(),
                category_label: d.category_label.to_string(),
                script_path: format!("newswire-collector/src/adapters/{}", d.source),
            }
        })
        .collect()
}
