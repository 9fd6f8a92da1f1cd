use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, spanned::Spanned, FnArg, GenericArgument, Ident, ItemFn, Pat, PathArguments,
    Signature, Type,
};

/// Transform an asynchronous test into a synchronous one, inject dependencies,
/// and ensure that the database is dropped regardless of how the test terminates.
///
/// Injectable dependencies are [`crate::store::MongoStore`],
/// [`rocket::local::asynchronous::Client`] (a server over that store),
/// [`mongodb::Database`], and [`crate::model::mongodb::Coll<T>`].
///
/// These tests need a MongoDB replica set, so they are ignored unless the
/// `mongo-tests` feature is enabled.
#[proc_macro_attribute]
pub fn backend_test(_args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract type information and reject invalid function signatures.
    let Injected {
        args: test_args,
        wants_client,
        collection_idents,
        collection_types,
    } = match check_sig(item_fn.sig.clone()) {
        Ok(injected) => injected,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Only launch a server if the test asks for one.
    let maybe_client = if wants_client {
        quote! {
            let rocket_client = rocket::local::asynchronous::Client::tracked(crate::rocket_for_store(
                crate::test_figment(),
                std::sync::Arc::new(store.clone()),
                std::sync::Arc::new(crate::clock::SystemClock),
            ))
            .await
            .unwrap();
        }
    } else {
        quote! {}
    };

    // Rewrite the test function.
    quote! {
        #[test]
        #[cfg_attr(not(feature = "mongo-tests"), ignore)]
        fn #name() {
            /// Test setup.
            async fn setup() -> (crate::store::MongoStore, mongodb::Database) {
                log4rs_test_utils::test_logging::init_logging_once_for(
                    ["anonvote_backend"],
                    None,
                    None,
                );
                let db_client = crate::test_db_client().await;
                let db_name = crate::test_database_name();
                let store = crate::store::MongoStore::from_client(db_client.clone(), &db_name)
                    .await
                    .unwrap();
                let db = db_client.database(&db_name);
                (store, db)
            }

            /// The test itself.
            #item_fn

            /// Test cleanup.
            async fn cleanup(db: mongodb::Database) {
                db.drop(None).await.unwrap();
            }

            // Create an async runtime. We need a separate one for inside and
            // outside the `catch_unwind`.
            let outer_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("test-setup-cleanup")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            let inner_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            // Run the setup.
            let (store, db) = outer_runtime.block_on(setup());

            // Run the test, catching any panics.
            // Use mutexes to safely transfer `!UnwindSafe` data.
            let store_mutex = std::sync::Mutex::new(store);
            let db_mutex = std::sync::Mutex::new(db.clone());
            let runtime_mutex = std::sync::Mutex::new(inner_runtime);
            let result = std::panic::catch_unwind(|| {
                let store = store_mutex.into_inner().unwrap();
                let db = db_mutex.into_inner().unwrap();
                let runtime = runtime_mutex.into_inner().unwrap();

                #(
                    let #collection_idents = crate::model::mongodb::Coll::<#collection_types>::from_db(&db);
                )*

                runtime.block_on(async move {
                    #maybe_client
                    #new_name(#(#test_args),*).await
                });
            });

            // Run the cleanup.
            outer_runtime.block_on(cleanup(db));

            // If the test panicked, re-raise the panic.
            if let Err(cause) = result {
                std::panic::panic_any(cause);
            }
        }
    }
    .into()
}

/// What a test signature asks to have injected.
struct Injected {
    args: Vec<TokenStream2>,
    wants_client: bool,
    collection_idents: Vec<Ident>,
    collection_types: Vec<Ident>,
}

/// Ensure the wrapped test is async, extract parameters to inject in
/// declaration order, and reject unknown parameters.
fn check_sig(sig: Signature) -> Result<Injected, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_store = false;
    let mut has_client = false;
    let mut has_db = false;
    let mut args = vec![];
    let mut collection_idents = vec![];
    let mut collection_types = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let Pat::Ident(pat_ident) = &*pat_type.pat {
                if let Type::Path(type_path) = &*pat_type.ty {
                    if let Some(type_ident) = type_path.path.get_ident() {
                        let (seen, arg, what) = if type_ident == "MongoStore" {
                            (&mut has_store, quote! { store.clone() }, "`MongoStore`")
                        } else if type_ident == "Client" {
                            (
                                &mut has_client,
                                quote! { rocket_client },
                                "`rocket::local::asynchronous::Client`",
                            )
                        } else if type_ident == "Database" {
                            (&mut has_db, quote! { db.clone() }, "`mongodb::Database`")
                        } else {
                            return Err(unexpected(input));
                        };
                        if *seen {
                            return Err(syn::Error::new(
                                input.span(),
                                format!("Test cannot accept more than one {what}"),
                            ));
                        }
                        *seen = true;
                        args.push(arg);
                        continue;
                    } else if let Some(possible_collection) = type_path.path.segments.last() {
                        if possible_collection.ident == "Coll" {
                            if let PathArguments::AngleBracketed(generics) =
                                &possible_collection.arguments
                            {
                                if let Some(GenericArgument::Type(Type::Path(type_path))) =
                                    generics.args.first()
                                {
                                    if let Some(type_ident) = type_path.path.get_ident() {
                                        let ident = pat_ident.ident.clone();
                                        args.push(quote! { #ident });
                                        collection_idents.push(ident);
                                        collection_types.push(type_ident.clone());
                                        continue;
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        return Err(unexpected(input));
    }

    Ok(Injected {
        args,
        wants_client: has_client,
        collection_idents,
        collection_types,
    })
}

fn unexpected(input: &FnArg) -> syn::Error {
    syn::Error::new(
        input.span(),
        "Expected one of `store_ident: MongoStore`, `client_ident: Client`, `db_ident: Database` or `collection_ident: Coll<T>`",
    )
}
