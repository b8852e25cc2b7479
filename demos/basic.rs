use lsa_search::{IndexConfig, SearchIndex, Tokenizer};

fn main() {
    // build corpus
    let documents: Vec<String> = [
        "cats are great pets and purr when they are happy",
        "dogs are loyal companions that love long walks",
        "stock markets rose today on strong earnings",
        "bond yields fell as investors sought safety",
        "parrots can mimic human speech surprisingly well",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    // vocabulary cap 50, latent rank 3
    let config = IndexConfig::new(50, 3);
    let index = SearchIndex::build(documents, Tokenizer::english(), &config)
        .expect("index build failed");

    for query in ["feline pets", "financial news", ""] {
        let hits = index.search_top(query).expect("search failed");
        println!("query: {query:?}");
        for hit in hits {
            println!("  [{:>2}] {:.4}  {}", hit.index, hit.score, hit.document);
        }
    }
}
