use qrp::{
    LibraryEntry, Query, ResampleCache, RichQuery, RouteTable, RouteTableMessage, RoutingConfig,
    RoutingState, SharedLibrary, TableRefresher, TableStats,
};
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

const OCEAN_URN: &str = "urn:sha1:QLFYWY2RI5WZCTEP6MJKR5CAFGP7FQ5X";
const AUDIO_SCHEMA: &str = "http://www.limewire.com/schemas/audio.xsd";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Set RUST_LOG=qrp=debug to watch rebuilds and patch sequences.
    let filter = EnvFilter::builder()
        .with_default_directive(Level::WARN.into())
        .from_env_lossy();

    fmt().with_env_filter(filter).with_target(false).init();

    println!("QRP Route Table Demo");
    println!("====================\n");

    // Alice shares files; Bob is her neighbor deciding which queries
    // are worth forwarding to her.
    println!("1. Alice builds a route table from her shared library...");
    let mut library = SharedLibrary::new();
    library.add(LibraryEntry {
        path: "music/ocean waves.flac".into(),
        urns: vec![OCEAN_URN.into()],
    });
    library.add(LibraryEntry {
        path: "music/blue horizon.mp3".into(),
        urns: vec![],
    });
    library.add(LibraryEntry {
        path: "podcasts/deep dive 042.ogg".into(),
        urns: vec![],
    });
    let alice_table = library.build_table(65536, 7);
    let summary = TableStats::of(&alice_table);
    println!("   files: {}", library.len());
    println!(
        "   table: {} slots, {} set ({:.3}% full)",
        summary.size, summary.slots_set, summary.percent_full
    );

    println!("\n2. Alice encodes the table for Bob...");
    let mut alice_link = RoutingState::new();
    let messages = alice_link.prepare_update(&alice_table, true);
    for msg in &messages {
        match msg {
            RouteTableMessage::Reset { size, infinity } => {
                println!(
                    "   reset: {} slots, infinity {} ({} bytes)",
                    size,
                    infinity,
                    msg.encoded_len()
                );
            }
            RouteTableMessage::Patch(patch) => {
                println!(
                    "   patch {}/{}: {}, {}-bit entries, {} bytes",
                    patch.sequence_number,
                    patch.sequence_size,
                    patch.compressor,
                    patch.entry_bits,
                    msg.encoded_len()
                );
            }
        }
    }
    let total: usize = messages.iter().map(|m| m.encoded_len()).sum();
    println!("   {} bytes total for a {}-slot table", total, alice_table.size());

    println!("\n3. Bob applies the updates...");
    let mut bob_link = RoutingState::new();
    for msg in &messages {
        bob_link.handle_bytes(&msg.encode()).expect("well-formed update");
    }
    let stats = bob_link.stats();
    println!(
        "   resets: {}, patches: {}, sequences completed: {}",
        stats.resets_received, stats.patches_received, stats.sequences_completed
    );
    println!(
        "   Bob's copy matches Alice's table: {}",
        bob_link.inbound_table() == Some(&alice_table)
    );

    println!("\n4. Bob routes queries against Alice's table...");
    let queries = [
        ("\"ocean waves\"", Query::new("ocean waves")),
        ("\"ocean sunrise\"", Query::new("ocean sunrise")),
        ("\"deep dive\"", Query::new("deep dive")),
        ("urn:sha1:QLFY...", Query::new("").with_urn(OCEAN_URN)),
    ];
    for (label, query) in &queries {
        let decision = if bob_link.should_route(query) {
            "forward"
        } else {
            "drop"
        };
        println!("   {:<20} -> {}", label, decision);
    }
    let stats = bob_link.stats();
    println!(
        "   checked {} queries, routed {}",
        stats.queries_checked, stats.queries_routed
    );

    println!("\n5. Rich metadata matching...");
    let mut tagged = RouteTable::new(65536, 7);
    tagged.add("blue horizon");
    tagged.add_indivisible(AUDIO_SCHEMA);
    let matching =
        Query::new("blue").with_rich(RichQuery::new(AUDIO_SCHEMA, vec!["blue horizon".into()]));
    let mismatched =
        Query::new("blue").with_rich(RichQuery::new(AUDIO_SCHEMA, vec!["polka dots".into()]));
    println!("   audio \"blue horizon\": {}", tagged.contains(&matching));
    println!("   audio \"polka dots\":   {}", tagged.contains(&mismatched));

    println!("\n6. Alice shares a new file; only the difference travels...");
    library.add(LibraryEntry {
        path: "jazz collection.flac".into(),
        urns: vec![],
    });
    let rebuilt = library.build_table(65536, 7);
    println!(
        "   \"jazz\" before the update: {}",
        bob_link.should_route(&Query::new("jazz"))
    );
    let update = alice_link.prepare_update(&rebuilt, true);
    let has_reset = update
        .iter()
        .any(|m| matches!(m, RouteTableMessage::Reset { .. }));
    let bytes: usize = update.iter().map(|m| m.encoded_len()).sum();
    println!(
        "   update: {} message(s), {} bytes, reset included: {}",
        update.len(),
        bytes,
        has_reset
    );
    for msg in &update {
        bob_link.handle_bytes(&msg.encode()).expect("well-formed update");
    }
    println!(
        "   \"jazz\" after the update:  {}",
        bob_link.should_route(&Query::new("jazz"))
    );

    println!("\n7. Alice aggregates her leaves into a composite table...");
    let mut leaf_a = RouteTable::new(8192, 7);
    leaf_a.add("classical/vivaldi four seasons.flac");
    let mut leaf_b = RouteTable::new(2048, 7);
    leaf_b.add("jazz/miles davis kind of blue.mp3");
    let mut composite = rebuilt.clone();
    composite.add_all(&leaf_a);
    composite.add_all(&leaf_b);
    println!(
        "   leaves: {} and {} slots, composite: {} slots, {} set",
        leaf_a.size(),
        leaf_b.size(),
        composite.size(),
        composite.count_ones()
    );
    println!(
        "   \"vivaldi\" via leaf A: {}",
        composite.contains(&Query::new("vivaldi"))
    );
    println!(
        "   \"davis\" via leaf B:   {}",
        composite.contains(&Query::new("davis"))
    );
    println!(
        "   \"chopin\" anywhere:    {}",
        composite.contains(&Query::new("chopin"))
    );
    let mut views = ResampleCache::new(4);
    let legacy = views.resample(&composite, 2048);
    println!(
        "   composite rescaled to {} slots for a legacy neighbor, \"davis\": {}",
        legacy.size(),
        legacy.contains(&Query::new("davis"))
    );

    println!("\n8. Debounced rebuilds from a changing library...");
    let config = RoutingConfig {
        rebuild_delay_ms: 200,
        max_rebuild_delay_ms: 1_000,
        ..RoutingConfig::default()
    };
    let (refresher, files, mut tables) = TableRefresher::new(config).expect("valid config");
    tokio::spawn(refresher.run());
    files.add_file("classical/vivaldi spring.mp3", vec![]).await;
    files.add_file("classical/bach cello suite.ogg", vec![]).await;
    println!("   added {} files, waiting out the quiet period...", files.file_count().await);
    tables.changed().await.expect("refresher alive");
    let table = tables.borrow_and_update().clone();
    println!("   rebuilt: {} slots set", table.count_ones());
    println!(
        "   routes \"vivaldi\": {}",
        table.contains(&Query::new("vivaldi"))
    );

    println!("\nDone.");
}
